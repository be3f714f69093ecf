//! Health and metric collection subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (collector.rs)
//!     → RoutingState::snapshot()
//!     → For each backend, concurrently:
//!         source.rs (fetch usage sample by name, bounded by a timeout)
//!         → cpu.rs (parse payload, compute CPU%)
//!     → RoutingState::report_metric(name, cpu, healthy)
//! ```
//!
//! # Design Decisions
//! - Failed fetches mark a backend unhealthy with a sentinel CPU value
//! - One backend's failure never aborts the cycle for the others
//! - Failures are retried implicitly on the next cycle
//! - The sleep between cycles is cut short by the shutdown signal

pub mod collector;
pub mod cpu;
pub mod source;

pub use collector::{CycleReport, HealthCollector, SampleOutcome};
pub use cpu::CpuSample;
pub use source::{DockerStatsSource, MetricsSource};

/// Why a usage sample could not be obtained.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, transport error, or unknown backend.
    #[error("metrics source unreachable: {0}")]
    Unreachable(String),

    /// The source answered but the payload had the wrong shape.
    #[error("malformed metrics payload: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Unreachable(_) => "unreachable",
            FetchError::Malformed(_) => "malformed",
        }
    }
}
