//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::Strategy;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Backend selection strategy.
    pub strategy: Strategy,

    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Managed backends, in priority/registration order.
    pub targets: Vec<TargetConfig>,

    /// CPU collector settings.
    pub monitor: MonitorConfig,

    /// Byte relay settings.
    pub relay: RelayConfig,

    /// Shutdown behavior.
    pub shutdown: ShutdownConfig,

    /// Interactive console.
    pub console: ConsoleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_host: String,

    /// Port clients connect to.
    pub listen_port: u16,

    /// Maximum concurrent relay pairs (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    /// `host:port` the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.listen_port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            listen_port: 8080,
            max_connections: 10_000,
        }
    }
}

/// One managed backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Container name; also the key used to query its CPU usage.
    pub name: String,

    /// Host the container's port is published on.
    #[serde(default = "default_target_host")]
    pub host: String,

    /// Published port on `host`.
    pub host_port: u16,
}

fn default_target_host() -> String {
    "127.0.0.1".to_string()
}

/// CPU collector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between the starts of consecutive collection cycles.
    pub interval_secs: u64,

    /// Deadline for a single backend's metric fetch, in seconds.
    pub fetch_timeout_secs: u64,

    /// Path of the Docker Engine API socket.
    pub docker_socket: String,

    /// Optional Engine API version prefix (e.g., "v1.43").
    pub api_version: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            fetch_timeout_secs: 3,
            docker_socket: "/var/run/docker.sock".to_string(),
            api_version: None,
        }
    }
}

/// Byte relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Size of each direction's copy buffer in bytes.
    pub buffer_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            buffer_size: 8192,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight relay pairs may keep running after shutdown starts.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 10 }
    }
}

/// Interactive console configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Read `status`/`exit` commands from stdin.
    pub enabled: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
