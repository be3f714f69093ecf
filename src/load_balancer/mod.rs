//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Collector sample → pool.rs (RoutingState::report_metric)
//!
//! Client connection accepted
//!     → pool.rs (RoutingState::select_backend, under the registry lock)
//!     → Apply strategy to the healthy backends:
//!         - least_cpu.rs (lowest CPU%, first registered wins ties)
//!         - round_robin.rs (rotate, cursor kept in the registry)
//!     → BackendAddr handed to the relay engine, or None
//! ```
//!
//! # Design Decisions
//! - One registry lock guards targets and the round-robin cursor together
//! - Strategies are pure functions over a slice of targets
//! - Unhealthy backends excluded from selection
//! - No I/O ever happens while the lock is held

pub mod backend;
pub mod least_cpu;
pub mod pool;
pub mod round_robin;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use backend::{BackendAddr, BackendTarget, SENTINEL_CPU_PERCENT};
pub use pool::RoutingState;

/// Backend selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Pick the healthy backend with the lowest CPU utilization.
    #[default]
    LeastCpu,
    /// Cycle through healthy backends in registration order.
    RoundRobin,
}

impl Strategy {
    /// Index of the chosen backend within `targets`, if any is healthy.
    pub(crate) fn pick(self, targets: &[BackendTarget], cursor: &mut usize) -> Option<usize> {
        match self {
            Strategy::LeastCpu => least_cpu::pick(targets),
            Strategy::RoundRobin => round_robin::pick(targets, cursor),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::LeastCpu => "least_cpu",
            Strategy::RoundRobin => "round_robin",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the routing registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("backend target '{0}' is already registered")]
    DuplicateTarget(String),
}
