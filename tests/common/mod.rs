//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use site_unblock::config::ProxyConfig;
use site_unblock::lifecycle::Shutdown;
use site_unblock::net::{Listener, ListenerError, ProxyServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const REAL_RESPONSE: &[u8] = b"HTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nHello";

/// A scripted upstream that records every byte each connection sent it.
#[allow(dead_code)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Vec<u8>>>>,
    connections: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockUpstream {
    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Bytes received, one entry per connection that completed its read.
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().unwrap().clone()
    }
}

/// Start an upstream that, per connection, reads until it has seen two
/// header sections and `tail`, then writes `reply` and closes.
pub async fn start_upstream(reply: &'static [u8], tail: &'static [u8]) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));

    let (rec, conns) = (received.clone(), connections.clone());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            conns.fetch_add(1, Ordering::SeqCst);
            let rec = rec.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                let mut buf = [0u8; 4096];
                while !complete(&seen, tail) {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => seen.extend_from_slice(&buf[..n]),
                    }
                }
                rec.lock().unwrap().push(seen);
                let _ = socket.write_all(reply).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockUpstream { addr, received, connections }
}

/// Upstream answering with a decoy response followed by [`REAL_RESPONSE`].
pub async fn start_splice_upstream() -> MockUpstream {
    start_upstream(BOTH_RESPONSES, b"\r\n\r\n").await
}

pub const BOTH_RESPONSES: &[u8] =
    b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\nHTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nHello";

fn complete(seen: &[u8], tail: &[u8]) -> bool {
    seen.windows(4).filter(|w| *w == b"\r\n\r\n").count() >= 2 && seen.ends_with(tail)
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A running relay on an ephemeral port.
#[allow(dead_code)]
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ListenerError>>,
}

pub async fn start_proxy(mut config: ProxyConfig) -> RunningProxy {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(config);
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    RunningProxy { addr, shutdown, handle }
}

/// Send `input` through the relay, half-close, and collect the reply.
pub async fn converse(proxy: SocketAddr, input: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(input).await.unwrap();
    client.shutdown().await.unwrap();

    let mut received = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(10), client.read_to_end(&mut received))
        .await
        .expect("relay did not close the connection");
    match read {
        Ok(_) => {}
        // Closing with unread input pending may reset instead of FIN.
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {}
        Err(e) => panic!("read from relay failed: {e}"),
    }
    received
}

pub fn get(host: impl std::fmt::Display) -> Vec<u8> {
    format!("GET / HTTP/1.1\r\nHost: {}\r\n\r\n", host).into_bytes()
}
