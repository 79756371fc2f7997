//! The single-threaded, non-blocking event loop: one `mio` poll drives
//! both listening and client sockets, readiness dictates when each
//! connection's state machine advances, and a request is parsed and
//! dispatched only once `http::request::is_complete` says so.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use crate::config::Config;
use crate::error::Result;
use crate::handlers;
use crate::http::request;
use crate::http::response::Response;
use crate::server::connection::{ClientConnection, ConnState};
use weblog::{debug, error, info, trace};

const POLL_TIMEOUT: Duration = Duration::from_millis(1000);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const READ_CHUNK: usize = 8192;
/// Guard well above the parser's own 10 MiB body cap plus header room, so a
/// client that never completes a request can't grow the buffer forever.
const MAX_BUFFERED_REQUEST: usize = 16 * 1024 * 1024;

struct ListenerEntry {
    listener: TcpListener,
    bind_host: String,
    bind_port: u16,
}

pub struct Server {
    config: Config,
    poll: Poll,
    listeners: HashMap<Token, ListenerEntry>,
    connections: HashMap<Token, ClientConnection>,
    next_token: usize,
    shutdown: &'static AtomicBool,
}

impl Server {
    pub fn new(config: Config, shutdown: &'static AtomicBool) -> Result<Self> {
        let poll = Poll::new()?;
        let mut listeners = HashMap::new();
        let mut next_token = 0usize;

        for (host, port) in config.listen_endpoints() {
            let addr: SocketAddr = format!("{host}:{port}").parse()?;
            let mut listener = TcpListener::bind(addr)?;
            let token = Token(next_token);
            next_token += 1;
            poll.registry().register(&mut listener, token, Interest::READABLE)?;
            info!("listening on {host}:{port}");
            listeners.insert(
                token,
                ListenerEntry {
                    listener,
                    bind_host: host.clone(),
                    bind_port: *port,
                },
            );
        }

        Ok(Server {
            config,
            poll,
            listeners,
            connections: HashMap::new(),
            next_token,
            shutdown,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(1024);

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            let ready: Vec<Token> = events.iter().map(|e| e.token()).collect();
            for token in ready {
                if self.listeners.contains_key(&token) {
                    self.accept_all(token);
                } else if let Some(conn) = self.connections.get(&token) {
                    match conn.state {
                        ConnState::Reading => self.handle_readable(token),
                        ConnState::Writing => self.handle_writable(token),
                    }
                }
            }

            self.sweep_idle_connections();
        }

        self.shutdown_all();
        Ok(())
    }

    fn accept_all(&mut self, listener_token: Token) {
        let (bind_host, bind_port) = {
            let entry = self.listeners.get(&listener_token).unwrap();
            (entry.bind_host.clone(), entry.bind_port)
        };

        loop {
            let accepted = {
                let entry = self.listeners.get_mut(&listener_token).unwrap();
                entry.listener.accept()
            };
            match accepted {
                Ok((mut stream, remote_addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                        error!("failed to register accepted connection: {e}");
                        continue;
                    }
                    debug!("accepted {remote_addr} on {bind_host}:{bind_port}");
                    let conn = ClientConnection::new(stream, remote_addr, bind_host.clone(), bind_port);
                    self.connections.insert(token, conn);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("accept failed on {bind_host}:{bind_port}: {e}");
                    break;
                }
            }
        }
    }

    fn handle_readable(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        let mut buf = [0u8; READ_CHUNK];
        let mut peer_closed = false;
        loop {
            match conn.stream.read(&mut buf) {
                Ok(0) => {
                    peer_closed = true;
                    break;
                }
                Ok(n) => {
                    conn.recv_buffer.extend_from_slice(&buf[..n]);
                    conn.touch();
                    if conn.recv_buffer.len() > MAX_BUFFERED_REQUEST {
                        peer_closed = true;
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => {
                    peer_closed = true;
                    break;
                }
            }
        }

        if request::is_complete(&conn.recv_buffer) {
            self.dispatch(token);
        } else if peer_closed {
            self.close_connection(token);
        }
    }

    /// Parses and routes one request, writes the response into the
    /// connection's send buffer, and flips it over to `Writing`. A panic
    /// inside the handler pipeline is caught here and reported as a 500
    /// rather than unwinding the event loop.
    fn dispatch(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        let raw = std::mem::take(&mut conn.recv_buffer);
        let bind_host = conn.bind_host.clone();
        let bind_port = conn.bind_port;
        let remote_addr = conn.remote_addr;

        let response = match request::parse_request(&raw) {
            Ok(req) => {
                trace!("{} {} from {remote_addr}", req.method().as_str(), req.uri());
                let config = &self.config;
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    handlers::handle_request(config, &bind_host, bind_port, &req)
                }));
                outcome.unwrap_or_else(|_| {
                    error!("handler panicked while serving {remote_addr}; returning 500");
                    Response::error(500)
                })
            }
            Err(e) => Response::error(e.status_code()),
        };

        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        conn.send_buffer = response.to_bytes();
        conn.state = ConnState::Writing;
        conn.touch();
        if let Err(e) = self.poll.registry().reregister(&mut conn.stream, token, Interest::WRITABLE) {
            error!("failed to reregister {remote_addr} for write: {e}");
            self.close_connection(token);
        }
    }

    fn handle_writable(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        match conn.stream.write(&conn.send_buffer) {
            Ok(n) => {
                conn.send_buffer.drain(..n);
                conn.touch();
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => return,
            Err(_) => {
                self.close_connection(token);
                return;
            }
        }

        if conn.send_buffer.is_empty() {
            // One request per connection: the response drained, nothing
            // keeps this socket open.
            self.close_connection(token);
        }
    }

    fn sweep_idle_connections(&mut self) {
        let now = Instant::now();
        let stale: Vec<Token> = self
            .connections
            .iter()
            .filter(|(_, conn)| now.duration_since(conn.last_activity) > IDLE_TIMEOUT)
            .map(|(token, _)| *token)
            .collect();

        for token in stale {
            if let Some(conn) = self.connections.get_mut(&token) {
                debug!("closing idle connection {}", conn.remote_addr);
                let _ = conn.stream.write(&Response::error(408).to_bytes());
            }
            self.close_connection(token);
        }
    }

    fn close_connection(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            let _ = conn.stream.shutdown(std::net::Shutdown::Both);
        }
    }

    fn shutdown_all(&mut self) {
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.close_connection(token);
        }
        for entry in self.listeners.values_mut() {
            let _ = self.poll.registry().deregister(&mut entry.listener);
        }
        info!("shutdown complete");
    }
}
