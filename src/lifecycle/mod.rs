//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics exporter → Routing state → Bind listener
//!         → Collector, relay engine, signals, console
//!
//! Shutdown (shutdown.rs):
//!     Signal or console `exit` → Stop accepting + stop collector
//!         → Drain relay pairs (grace period) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Console (console.rs):
//!     stdin line → status table | shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Drain has a deadline; relay pairs still open after it are abandoned

pub mod console;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Proxy, StartupError};
