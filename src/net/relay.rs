//! Connection relay engine.
//!
//! # Responsibilities
//! - Accept client connections without waiting on in-flight relays
//! - Pick a backend through the routing state
//! - Splice bytes in both directions until either side ends
//! - Close both sockets of a pair together

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::RelayConfig;
use crate::load_balancer::{BackendAddr, RoutingState};
use crate::net::connection::{ConnectionId, ConnectionTracker};
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// doesn't spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// One half of a relay pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to backend.
    Upstream,
    /// Backend to client.
    Downstream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upstream => "upstream",
            Direction::Downstream => "downstream",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-connection failures. None of these escape the engine.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("no healthy backend available")]
    NoHealthyBackend,

    #[error("failed to connect to backend {backend}: {source}")]
    BackendConnect {
        backend: BackendAddr,
        #[source]
        source: io::Error,
    },

    #[error("relay {direction} I/O error: {source}")]
    RelayIo {
        direction: Direction,
        #[source]
        source: io::Error,
    },
}

/// Summary of a relay pair that ended on end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied client → backend.
    pub upstream_bytes: u64,
    /// Bytes copied backend → client.
    pub downstream_bytes: u64,
    /// Direction whose end-of-stream tore the pair down.
    pub closed_by: Direction,
}

/// Tunables for each relay pair.
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub connect_timeout: Duration,
    pub buffer_size: usize,
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            buffer_size: config.buffer_size,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

/// Accept loop plus one task per relay pair.
pub struct RelayEngine {
    state: Arc<RoutingState>,
    settings: RelaySettings,
    tracker: ConnectionTracker,
}

impl RelayEngine {
    pub fn new(state: Arc<RoutingState>, settings: RelaySettings) -> Self {
        Self {
            state,
            settings,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Handle for counting and draining in-flight relay pairs.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept clients until the shutdown signal fires.
    ///
    /// In-flight relay pairs keep running after this returns; use
    /// [`ConnectionTracker::wait_for_drain`] to wait for them.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            address = ?listener.local_addr().ok(),
            strategy = %self.state.strategy(),
            "Relay engine accepting connections"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let state = Arc::clone(&self.state);
                        let settings = self.settings;
                        tokio::spawn(async move {
                            serve_client(&state, settings, stream, peer, guard.id()).await;
                            drop(permit);
                            drop(guard);
                        });
                    }
                    Err(ListenerError::Closed) => {
                        tracing::error!("Connection limiter closed, stopping accept loop");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!(
                        in_flight = self.tracker.active_count(),
                        "Relay engine received shutdown signal, no longer accepting"
                    );
                    break;
                }
            }
        }
    }
}

/// Relay one client and log how it ended.
async fn serve_client(
    state: &RoutingState,
    settings: RelaySettings,
    client: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
) {
    match relay_connection(state, settings, client, id).await {
        Ok(stats) => {
            metrics::record_connection("relayed");
            tracing::debug!(
                connection_id = %id,
                peer_addr = %peer,
                closed_by = %stats.closed_by,
                upstream_bytes = stats.upstream_bytes,
                downstream_bytes = stats.downstream_bytes,
                "Relay finished"
            );
        }
        Err(RelayError::NoHealthyBackend) => {
            metrics::record_connection("no_backend");
            tracing::warn!(connection_id = %id, peer_addr = %peer, "No healthy backend, closing client");
        }
        Err(e @ RelayError::BackendConnect { .. }) => {
            metrics::record_connection("connect_failed");
            tracing::warn!(connection_id = %id, peer_addr = %peer, error = %e, "Closing client");
        }
        Err(e @ RelayError::RelayIo { .. }) => {
            metrics::record_connection("relayed");
            tracing::debug!(connection_id = %id, peer_addr = %peer, error = %e, "Relay aborted");
        }
    }
}

/// Route `client` to a backend and relay until either side ends.
///
/// Both sockets are owned here and closed on every return path.
pub async fn relay_connection(
    state: &RoutingState,
    settings: RelaySettings,
    mut client: TcpStream,
    id: ConnectionId,
) -> Result<RelayStats, RelayError> {
    let backend = state.select_backend().ok_or(RelayError::NoHealthyBackend)?;

    let mut upstream = match time::timeout(settings.connect_timeout, TcpStream::connect(backend.authority())).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(RelayError::BackendConnect { backend, source }),
        Err(_) => {
            return Err(RelayError::BackendConnect {
                backend,
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            })
        }
    };

    tracing::info!(connection_id = %id, backend = %backend, "Routing connection");

    enable_nodelay(&client, id, "client");
    enable_nodelay(&upstream, id, "backend");

    splice(&mut client, &mut upstream, settings.buffer_size).await
}

/// Disable Nagle on one side of a pair. A failure is logged and the relay
/// carries on. Returns whether the option was applied.
fn enable_nodelay(stream: &TcpStream, id: ConnectionId, side: &'static str) -> bool {
    match stream.set_nodelay(true) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(connection_id = %id, side, error = %e, "Failed to set TCP_NODELAY");
            false
        }
    }
}

/// Copy both directions until one of them ends, then stop the other.
async fn splice(
    client: &mut TcpStream,
    backend: &mut TcpStream,
    buffer_size: usize,
) -> Result<RelayStats, RelayError> {
    let (mut client_rd, mut client_wr) = client.split();
    let (mut backend_rd, mut backend_wr) = backend.split();

    let mut upstream_bytes = 0u64;
    let mut downstream_bytes = 0u64;

    let (closed_by, result) = {
        let upstream = pump(&mut client_rd, &mut backend_wr, buffer_size, Direction::Upstream, &mut upstream_bytes);
        let downstream = pump(&mut backend_rd, &mut client_wr, buffer_size, Direction::Downstream, &mut downstream_bytes);

        tokio::select! {
            r = upstream => (Direction::Upstream, r),
            r = downstream => (Direction::Downstream, r),
        }
    };

    result.map_err(|source| RelayError::RelayIo {
        direction: closed_by,
        source,
    })?;

    Ok(RelayStats {
        upstream_bytes,
        downstream_bytes,
        closed_by,
    })
}

/// Copy `reader` into `writer` chunk by chunk until end-of-stream.
async fn pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    direction: Direction,
    copied: &mut u64,
) -> io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        *copied += n as u64;
        metrics::record_relayed_bytes(direction.as_str(), n as u64);
    }
}
