//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command-line values that take precedence over the file.
///
/// Applied before validation, so an override is checked like any file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub console_enabled: Option<bool>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(enabled) = self.console_enabled {
            config.console.enabled = enabled;
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    load_config_with(path, &ConfigOverrides::default())
}

/// Load a TOML file, apply `overrides`, then validate the result.
pub fn load_config_with(path: &Path, overrides: &ConfigOverrides) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_with(&content, overrides)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    parse_config_with(content, &ConfigOverrides::default())
}

pub fn parse_config_with(content: &str, overrides: &ConfigOverrides) -> Result<ProxyConfig, ConfigError> {
    let mut config: ProxyConfig = toml::from_str(content)?;
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::Strategy;

    const FULL: &str = r#"
        strategy = "round_robin"

        [listener]
        listen_port = 9000

        [monitor]
        interval_secs = 2
        api_version = "v1.43"

        [console]
        enabled = false

        [[targets]]
        name = "web1"
        host_port = 8001

        [[targets]]
        name = "web2"
        host = "10.0.0.2"
        host_port = 8002
    "#;

    #[test]
    fn parses_full_config() {
        let config = parse_config(FULL).unwrap();
        assert_eq!(config.strategy, Strategy::RoundRobin);
        assert_eq!(config.listener.listen_port, 9000);
        assert_eq!(config.listener.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.monitor.interval_secs, 2);
        assert_eq!(config.monitor.fetch_timeout_secs, 3);
        assert_eq!(config.monitor.api_version.as_deref(), Some("v1.43"));
        assert!(!config.console.enabled);

        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].host, "127.0.0.1");
        assert_eq!(config.targets[1].host, "10.0.0.2");
        assert_eq!(config.targets[1].host_port, 8002);
    }

    #[test]
    fn strategy_defaults_to_least_cpu() {
        let config = parse_config("[[targets]]\nname = \"a\"\nhost_port = 1\n").unwrap();
        assert_eq!(config.strategy, Strategy::LeastCpu);
        assert_eq!(config.relay.buffer_size, 8192);
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        let err = parse_config("strategy = \"weighted\"\n[[targets]]\nname = \"a\"\nhost_port = 1\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_errors_are_reported() {
        let err = parse_config("[monitor]\ninterval_secs = 0\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn sample_config_is_valid() {
        let config = load_config(&Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml")).unwrap();
        assert_eq!(config.targets.len(), 3);
        assert_eq!(config.strategy, Strategy::LeastCpu);
    }

    #[test]
    fn overrides_replace_file_values() {
        let overrides = ConfigOverrides {
            log_level: Some("debug".into()),
            console_enabled: Some(false),
        };
        let config = parse_config_with(FULL, &overrides).unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert!(!config.console.enabled);
    }

    #[test]
    fn invalid_log_level_override_is_rejected() {
        let overrides = ConfigOverrides {
            log_level: Some("loud".into()),
            ..Default::default()
        };
        match parse_config_with(FULL, &overrides).unwrap_err() {
            ConfigError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "observability.log_level");
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/container-proxy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
