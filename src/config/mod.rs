//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to startup, which builds each subsystem from its section
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no hot reload
//! - All sections have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_with, parse_config, parse_config_with, ConfigError, ConfigOverrides};
pub use schema::{
    ConsoleConfig, ListenerConfig, MonitorConfig, ObservabilityConfig, ProxyConfig, RelayConfig,
    ShutdownConfig, TargetConfig,
};
pub use validation::ValidationError;
