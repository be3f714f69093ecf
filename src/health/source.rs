//! Out-of-band metrics sources.
//!
//! # Responsibilities
//! - Fetch a point-in-time usage sample for a backend, keyed by name
//! - Classify failures as unreachable (transport) or malformed (payload)
//!
//! The shipped source talks to the Docker Engine API over its Unix socket:
//! `GET /containers/{name}/stats?stream=false`, one HTTP/1.1 connection per
//! request.

use std::future::Future;
use std::path::PathBuf;

use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use crate::config::MonitorConfig;
use crate::health::cpu::{parse_stats, CpuSample};
use crate::health::FetchError;

/// Something that can report CPU usage for a backend by name.
///
/// Implementations return one sample per document the source produced;
/// the collector averages them. Deadlines are enforced by the collector.
pub trait MetricsSource: Send + Sync + 'static {
    fn fetch(&self, name: &str) -> impl Future<Output = Result<Vec<CpuSample>, FetchError>> + Send;
}

/// Docker Engine API client over the local control socket.
#[derive(Debug, Clone)]
pub struct DockerStatsSource {
    socket_path: PathBuf,
    api_version: Option<String>,
}

impl DockerStatsSource {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            api_version: None,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            socket_path: PathBuf::from(&config.docker_socket),
            api_version: config.api_version.clone(),
        }
    }

    /// Pin requests to an Engine API version, e.g. `v1.43`.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    fn stats_path(&self, name: &str) -> String {
        match &self.api_version {
            Some(v) => format!("/{}/containers/{}/stats?stream=false", v.trim_matches('/'), name),
            None => format!("/containers/{}/stats?stream=false", name),
        }
    }

    async fn request_stats(&self, name: &str) -> Result<Bytes, FetchError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            FetchError::Unreachable(format!(
                "cannot connect to {}: {}",
                self.socket_path.display(),
                e
            ))
        })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| FetchError::Unreachable(format!("handshake failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "Docker API connection error");
            }
        });

        let request = Request::builder()
            .method("GET")
            .uri(self.stats_path(name))
            .header("host", "docker")
            .header("user-agent", "container-proxy-monitor")
            .body(Empty::<Bytes>::new())
            .map_err(|e| FetchError::Unreachable(format!("invalid request: {e}")))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| FetchError::Unreachable(format!("request failed: {e}")))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(FetchError::Unreachable(format!("container '{name}' not found")));
            }
            status => {
                return Err(FetchError::Unreachable(format!("Docker API returned {status}")));
            }
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| FetchError::Unreachable(format!("reading body failed: {e}")))?;
        Ok(body.to_bytes())
    }
}

impl MetricsSource for DockerStatsSource {
    async fn fetch(&self, name: &str) -> Result<Vec<CpuSample>, FetchError> {
        let body = self.request_stats(name).await?;
        parse_stats(&body)
    }
}
