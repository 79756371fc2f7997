//! Per-client connection state: the socket, its read/write buffers, an
//! activity clock for the idle-timeout sweep, and a small state enum. The
//! reactor owns these exclusively by `Token` — nothing else holds a
//! reference across dispatches.

use std::net::SocketAddr;
use std::time::Instant;

use mio::net::TcpStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Reading,
    Writing,
}

pub struct ClientConnection {
    pub stream: TcpStream,
    pub remote_addr: SocketAddr,
    pub recv_buffer: Vec<u8>,
    pub send_buffer: Vec<u8>,
    pub last_activity: Instant,
    pub state: ConnState,
    pub bind_host: String,
    pub bind_port: u16,
}

impl ClientConnection {
    pub fn new(stream: TcpStream, remote_addr: SocketAddr, bind_host: String, bind_port: u16) -> Self {
        ClientConnection {
            stream,
            remote_addr,
            recv_buffer: Vec::new(),
            send_buffer: Vec::new(),
            last_activity: Instant::now(),
            state: ConnState::Reading,
            bind_host,
            bind_port,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}
