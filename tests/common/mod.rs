//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use container_proxy::config::{ProxyConfig, TargetConfig};
use container_proxy::health::{CpuSample, MetricsSource};
use container_proxy::health::FetchError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// What a mock backend saw on one connection, reported when the client side
/// reached end-of-stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub received: Vec<u8>,
}

/// Start a backend that echoes every byte back and reports each finished
/// connection.
pub async fn start_echo_backend() -> (SocketAddr, mpsc::UnboundedReceiver<Session>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut received = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            received.extend_from_slice(&buf[..n]);
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = tx.send(Session { received });
            });
        }
    });

    (addr, rx)
}

/// Start a backend that writes `greeting` to every client, then closes.
pub async fn start_greeting_backend(greeting: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(greeting).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a backend that accepts connections but never reads or writes.
/// Returns how many connections it has accepted so far.
pub async fn start_stalled_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    (addr, accepted)
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Wait for the next finished session, failing the test after two seconds.
pub async fn next_session(rx: &mut mpsc::UnboundedReceiver<Session>) -> Session {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("backend saw no end-of-stream")
        .expect("backend task ended")
}

/// A sample whose utilization is exactly `percent` on one core.
pub fn sample(percent: u64) -> CpuSample {
    CpuSample {
        target_usage: percent * 100,
        prev_target_usage: 0,
        system_usage: 10_000,
        prev_system_usage: 0,
        online_cpus: Some(1),
    }
}

/// Metrics source whose answers can be changed while the proxy runs.
/// Names without an answer are unreachable.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    answers: Arc<Mutex<HashMap<String, Result<Vec<CpuSample>, FetchError>>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cpu(&self, name: &str, percent: u64) {
        self.answers
            .lock()
            .unwrap()
            .insert(name.to_string(), Ok(vec![sample(percent)]));
    }

    pub fn set_error(&self, name: &str, error: FetchError) {
        self.answers.lock().unwrap().insert(name.to_string(), Err(error));
    }
}

impl MetricsSource for ScriptedSource {
    async fn fetch(&self, name: &str) -> Result<Vec<CpuSample>, FetchError> {
        let answer = self.answers.lock().unwrap().get(name).cloned();
        answer.unwrap_or_else(|| Err(FetchError::Unreachable(format!("no such container {name}"))))
    }
}

pub fn target(name: &str, port: u16) -> TargetConfig {
    TargetConfig {
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        host_port: port,
    }
}

/// Config listening on an ephemeral loopback port with a fast collector and
/// no console.
pub fn test_config(targets: Vec<TargetConfig>) -> ProxyConfig {
    let mut config = ProxyConfig {
        targets,
        ..ProxyConfig::default()
    };
    config.listener.bind_host = "127.0.0.1".to_string();
    config.listener.listen_port = 0;
    config.monitor.interval_secs = 1;
    config.monitor.fetch_timeout_secs = 1;
    config.shutdown.grace_secs = 1;
    config.console.enabled = false;
    config
}

/// Poll `check` every 20ms until it holds, failing after `within`.
pub async fn eventually<F: FnMut() -> bool>(within: Duration, mut check: F) {
    let deadline = tokio::time::Instant::now() + within;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
