//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_backend_cpu_percent` (gauge): latest CPU sample per backend
//! - `proxy_backend_health` (gauge): 1=healthy, 0=unhealthy
//! - `proxy_metric_fetch_failures_total` (counter): by backend and kind
//! - `proxy_connections_total` (counter): by outcome
//! - `proxy_active_connections` (gauge): current relay pairs
//! - `proxy_relayed_bytes_total` (counter): by direction
//!
//! Recording goes through the `metrics` facade and is a no-op until an
//! exporter is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_backend_sample(backend: &str, cpu_percent: f64, healthy: bool) {
    metrics::gauge!("proxy_backend_cpu_percent", "backend" => backend.to_string()).set(cpu_percent);
    metrics::gauge!("proxy_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_fetch_failure(backend: &str, kind: &'static str) {
    metrics::counter!(
        "proxy_metric_fetch_failures_total",
        "backend" => backend.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Outcome label: `relayed`, `no_backend` or `connect_failed`.
pub fn record_connection(outcome: &'static str) {
    metrics::counter!("proxy_connections_total", "outcome" => outcome).increment(1);
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("proxy_active_connections").set(count as f64);
}

/// Direction label: `upstream` (client to backend) or `downstream`.
pub fn record_relayed_bytes(direction: &'static str, bytes: u64) {
    metrics::counter!("proxy_relayed_bytes_total", "direction" => direction).increment(bytes);
}
