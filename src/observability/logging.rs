//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Honor `RUST_LOG` first, then the configured level
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Configured level applies to this crate; dependencies stay at `warn`

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for a configured level.
pub fn default_directive(level: &str) -> String {
    format!("warn,container_proxy={}", level.to_ascii_lowercase())
}

/// Filter from `RUST_LOG` when set, else from the configured level.
///
/// An invalid configured level is an error rather than a silently dropped
/// directive.
pub fn build_filter(level: &str) -> Result<EnvFilter, ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_directive(level)),
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(level: &str) -> Result<(), ParseError> {
    let filter = build_filter(level)?;

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_scopes_level_to_crate() {
        assert_eq!(default_directive("DEBUG"), "warn,container_proxy=debug");
    }

    #[test]
    fn init_twice_is_harmless() {
        init_logging("info").unwrap();
        init_logging("debug").unwrap();
        tracing::info!("logging initialized");
    }

    #[test]
    fn unknown_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(build_filter("loud").is_err());
        }
        assert!(EnvFilter::try_new(default_directive("warn")).is_ok());
    }
}
