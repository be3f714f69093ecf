//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single managed backend (one container)
//! - Carry the latest CPU sample and health flag published by the collector
//! - Describe the address handed to the relay engine

use std::fmt;

/// CPU percentage recorded for a backend whose metrics could not be collected.
///
/// Large enough that `least_cpu` never prefers such a backend, but finite so
/// status output and arithmetic stay sane.
pub const SENTINEL_CPU_PERCENT: f64 = 9999.0;

/// A single managed backend and its live metrics.
///
/// Values of this type handed out by [`RoutingState::snapshot`] are copies;
/// the live records are owned by the routing state.
///
/// [`RoutingState::snapshot`]: crate::load_balancer::pool::RoutingState::snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct BackendTarget {
    /// Container name, unique among targets.
    pub name: String,
    /// Host the backend listens on.
    pub host: String,
    /// Port the backend listens on.
    pub port: u16,
    /// Most recent CPU utilization, in percent of one core. Never negative.
    pub cpu_percent: f64,
    /// Whether the backend is eligible for selection.
    pub healthy: bool,
}

impl BackendTarget {
    /// Create a freshly registered backend: idle and healthy.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            cpu_percent: 0.0,
            healthy: true,
        }
    }

    /// Apply a collector sample. CPU and health change together.
    pub(crate) fn apply_sample(&mut self, cpu_percent: f64, healthy: bool) {
        self.cpu_percent = sanitize_cpu(cpu_percent);
        self.healthy = healthy;
    }

    /// The address the relay engine should dial for this backend.
    pub fn addr(&self) -> BackendAddr {
        BackendAddr {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
        }
    }
}

/// Clamp a reported CPU value into the stored domain.
///
/// Negative readings become 0; NaN and infinities are treated as "no usable
/// reading" and mapped to the sentinel.
fn sanitize_cpu(value: f64) -> f64 {
    if !value.is_finite() {
        SENTINEL_CPU_PERCENT
    } else if value < 0.0 {
        0.0
    } else {
        value
    }
}

/// Result of a backend selection: where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAddr {
    /// Name of the selected backend, for logging.
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl BackendAddr {
    /// `host:port` form suitable for `TcpStream::connect`.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for BackendAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_target_is_idle_and_healthy() {
        let t = BackendTarget::new("web1", "127.0.0.1", 8001);
        assert_eq!(t.cpu_percent, 0.0);
        assert!(t.healthy);
        assert_eq!(t.addr().authority(), "127.0.0.1:8001");
    }

    #[test]
    fn negative_cpu_is_clamped() {
        let mut t = BackendTarget::new("web1", "127.0.0.1", 8001);
        t.apply_sample(-3.5, true);
        assert_eq!(t.cpu_percent, 0.0);
    }

    #[test]
    fn non_finite_cpu_maps_to_sentinel() {
        let mut t = BackendTarget::new("web1", "127.0.0.1", 8001);
        t.apply_sample(f64::NAN, true);
        assert_eq!(t.cpu_percent, SENTINEL_CPU_PERCENT);
        t.apply_sample(f64::INFINITY, false);
        assert_eq!(t.cpu_percent, SENTINEL_CPU_PERCENT);
        assert!(!t.healthy);
    }
}
