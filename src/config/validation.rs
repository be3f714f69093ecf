//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals >= 1, ports non-zero)
//! - Reject duplicate or empty target names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint, collecting all violations.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.listen_port == 0 {
        errors.push(ValidationError::new("listener.listen_port", "must be non-zero"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be at least 1"));
    }

    if config.targets.is_empty() {
        errors.push(ValidationError::new("targets", "at least one target is required"));
    }
    let mut seen = HashSet::new();
    for (i, target) in config.targets.iter().enumerate() {
        if target.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("targets[{i}].name"), "must not be empty"));
        } else if !seen.insert(target.name.as_str()) {
            errors.push(ValidationError::new(
                format!("targets[{i}].name"),
                format!("duplicate target name '{}'", target.name),
            ));
        }
        if target.host_port == 0 {
            errors.push(ValidationError::new(format!("targets[{i}].host_port"), "must be non-zero"));
        }
        if target.host.trim().is_empty() {
            errors.push(ValidationError::new(format!("targets[{i}].host"), "must not be empty"));
        }
    }

    if config.monitor.interval_secs == 0 {
        errors.push(ValidationError::new("monitor.interval_secs", "must be at least 1"));
    }
    if config.monitor.fetch_timeout_secs == 0 {
        errors.push(ValidationError::new("monitor.fetch_timeout_secs", "must be at least 1"));
    }
    if config.relay.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("relay.connect_timeout_secs", "must be at least 1"));
    }
    if config.relay.buffer_size == 0 {
        errors.push(ValidationError::new("relay.buffer_size", "must be at least 1"));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
