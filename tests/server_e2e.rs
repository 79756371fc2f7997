//! End-to-end scenarios driving the real reactor over TCP sockets, matching
//! the concrete cases laid out for the dispatch pipeline: a plain static
//! GET, a location-level redirect, a POST upload, autoindex, path-traversal
//! rejection, and one-request-per-connection behavior.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use webserv::config::{parse_config, validate};
use webserv::server::Server;

fn spawn_server(src: &str) -> (&'static AtomicBool, thread::JoinHandle<()>) {
    let config = parse_config(src).unwrap();
    validate(&config).unwrap();
    let shutdown: &'static AtomicBool = Box::leak(Box::new(AtomicBool::new(false)));
    let handle = thread::spawn(move || {
        let mut server = Server::new(config, shutdown).unwrap();
        server.run().unwrap();
    });
    thread::sleep(Duration::from_millis(150));
    (shutdown, handle)
}

fn stop_server(shutdown: &'static AtomicBool, handle: thread::JoinHandle<()>) {
    shutdown.store(true, Ordering::SeqCst);
    handle.join().unwrap();
}

fn send_request(port: u16, raw: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.write_all(raw.as_bytes()).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf);
    buf
}

#[test]
fn simple_get_returns_file_contents() {
    let dir = std::env::temp_dir().join("webserv-e2e-1");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), b"hi").unwrap();
    let src = format!("server {{ listen 18080; root {}; }}", dir.display());
    let (shutdown, handle) = spawn_server(&src);

    let resp = send_request(18080, "GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
    let text = String::from_utf8_lossy(&resp);
    assert!(text.starts_with("HTTP/1.1 200 OK"));
    assert!(text.contains("Content-Length: 2"));
    assert!(text.contains("Content-Type: text/html"));
    assert!(text.ends_with("hi"));

    stop_server(shutdown, handle);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn redirect_location_returns_301() {
    let src = "server { listen 18081; root ./www; location /api { return 301 /v2; } }";
    let (shutdown, handle) = spawn_server(src);

    let resp = send_request(18081, "GET /api HTTP/1.1\r\nHost: x\r\n\r\n");
    let text = String::from_utf8_lossy(&resp);
    assert!(text.starts_with("HTTP/1.1 301 Moved Permanently"));
    assert!(text.contains("Location: /v2"));
    assert!(text.contains("Content-Length: 0"));

    stop_server(shutdown, handle);
}

#[test]
fn post_upload_writes_file_and_returns_201() {
    let dir = std::env::temp_dir().join("webserv-e2e-3");
    std::fs::create_dir_all(&dir).unwrap();
    let src = format!(
        "server {{ listen 18082; root {}; location /uploads {{ upload_enable on; }} }}",
        dir.display()
    );
    let (shutdown, handle) = spawn_server(&src);

    let body = "hello";
    let req = format!(
        "POST /uploads/a.txt HTTP/1.1\r\nHost: x\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let resp = send_request(18082, &req);
    assert!(String::from_utf8_lossy(&resp).starts_with("HTTP/1.1 201 Created"));
    assert_eq!(std::fs::read(dir.join("uploads/a.txt")).unwrap(), b"hello");

    stop_server(shutdown, handle);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn autoindex_lists_directory() {
    let dir = std::env::temp_dir().join("webserv-e2e-4");
    std::fs::create_dir_all(dir.join("dir")).unwrap();
    std::fs::write(dir.join("dir/a.txt"), b"x").unwrap();
    let src = format!(
        "server {{ listen 18083; root {}; location /dir {{ autoindex on; }} }}",
        dir.display()
    );
    let (shutdown, handle) = spawn_server(&src);

    let resp = send_request(18083, "GET /dir HTTP/1.1\r\nHost: x\r\n\r\n");
    let text = String::from_utf8_lossy(&resp);
    assert!(text.starts_with("HTTP/1.1 200 OK"));
    assert!(text.contains("<a href=\"../\""));
    assert!(text.contains("a.txt"));

    stop_server(shutdown, handle);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn path_traversal_is_rejected_without_touching_the_filesystem() {
    let src = "server { listen 18084; root ./www; }";
    let (shutdown, handle) = spawn_server(src);

    let resp = send_request(18084, "GET /../etc/passwd HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(String::from_utf8_lossy(&resp).starts_with("HTTP/1.1 400"));

    stop_server(shutdown, handle);
}

#[test]
fn connection_closes_after_one_response() {
    let dir = std::env::temp_dir().join("webserv-e2e-6");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), b"hi").unwrap();
    let src = format!("server {{ listen 18085; root {}; }}", dir.display());
    let (shutdown, handle) = spawn_server(&src);

    let mut stream = TcpStream::connect(("127.0.0.1", 18085)).unwrap();
    stream
        .write_all(b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n")
        .unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).unwrap();
    assert!(String::from_utf8_lossy(&buf).starts_with("HTTP/1.1 200"));

    let mut probe = [0u8; 16];
    let still_open = stream.write_all(b"GET / HTTP/1.1\r\n\r\n").is_ok()
        && stream.read(&mut probe).map(|n| n > 0).unwrap_or(false);
    assert!(!still_open, "socket should be closed after the first response");

    stop_server(shutdown, handle);
    std::fs::remove_dir_all(&dir).unwrap();
}
