//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ingress_gateway::controller::Event;
use ingress_gateway::resource::{HostRule, PathRule, ResourceKey, RuleObject};
use ingress_gateway::watch::{WatchError, WatchSource};

/// Start a backend that answers every request with its own request head as the body.
pub async fn start_echo_backend() -> SocketAddr {
    start_slow_echo_backend(Duration::ZERO).await
}

/// Echo backend that waits `delay` before answering.
pub async fn start_slow_echo_backend(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(echo_head(socket, delay));
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn echo_head(mut socket: TcpStream, delay: Duration) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }

    tokio::time::sleep(delay).await;
    let body = String::from_utf8_lossy(&head).to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Poll `check` until it holds, panicking after five seconds.
pub async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Await `fut`, panicking after five seconds.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

pub fn rule_object(name: &str, class: &str, host: &str, path: &str, service: &str, port: u16) -> RuleObject {
    RuleObject {
        namespace: "default".into(),
        name: name.into(),
        class_name: Some(class.into()),
        rules: vec![HostRule {
            host: host.into(),
            paths: vec![PathRule {
                path: path.into(),
                service_name: service.into(),
                service_port: port,
            }],
        }],
    }
}

/// Watch source whose cache lookups always fail.
pub struct FailingSource {
    events: Vec<Event>,
    pub lookups: AtomicU32,
}

impl FailingSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            lookups: AtomicU32::new(0),
        }
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl WatchSource for FailingSource {
    fn subscribe(self: Arc<Self>) -> BoxStream<'static, Event> {
        stream::iter(self.events.clone()).chain(stream::pending()).boxed()
    }

    fn get_by_key(&self, key: &ResourceKey) -> Result<Option<RuleObject>, WatchError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Err(WatchError::Lookup {
            key: key.clone(),
            reason: "store unavailable".into(),
        })
    }

    fn has_synced(&self) -> bool {
        true
    }
}
