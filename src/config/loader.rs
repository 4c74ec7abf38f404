//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::observability::otlp::OTLP_ENDPOINT_ENV;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Apply environment overrides on top of file or default configuration.
///
/// `OTEL_EXPORTER_OTLP_ENDPOINT` replaces `observability.otlp_endpoint`
/// when set and non-empty. The result is validated again.
pub fn apply_env_overrides(config: &mut ServiceConfig) -> Result<(), ConfigError> {
    override_otlp_endpoint(config, std::env::var(OTLP_ENDPOINT_ENV).ok());
    validate_config(config).map_err(ConfigError::Validation)
}

fn override_otlp_endpoint(config: &mut ServiceConfig, value: Option<String>) {
    if let Some(endpoint) = value.filter(|v| !v.trim().is_empty()) {
        config.observability.otlp_endpoint = Some(endpoint);
    }
}
