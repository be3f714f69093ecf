//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (ID assignment, in-flight tracking)
//!     → relay.rs (select backend, connect, splice both directions)
//!
//! Relay pair:
//!     client ──upstream──▶ backend
//!     client ◀─downstream── backend
//!     either side ends → both sockets closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept (semaphore) prevents resource exhaustion
//! - Each relay pair is its own task; the accept loop never waits on one
//! - Payload bytes are never inspected

pub mod connection;
pub mod listener;
pub mod relay;

pub use listener::Listener;
pub use relay::{RelayEngine, RelayError, RelaySettings, RelayStats};
