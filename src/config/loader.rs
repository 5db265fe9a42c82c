//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{ProxySettings, ServiceMap};
use crate::config::validation::{validate_services, validate_settings, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

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

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parse and validate a services document.
pub fn parse_services(content: &str) -> Result<ServiceMap, ConfigError> {
    let services: ServiceMap = serde_json::from_str(content)?;
    validate_services(&services).map_err(ConfigError::Validation)?;
    Ok(services)
}

/// Load and validate the services map from a JSON file.
pub fn load_services(path: &Path) -> Result<ServiceMap, ConfigError> {
    parse_services(&read(path)?)
}

/// Parse and validate a settings document.
pub fn parse_settings(content: &str) -> Result<ProxySettings, ConfigError> {
    let settings: ProxySettings = toml::from_str(content)?;
    validate_settings(&settings).map_err(ConfigError::Validation)?;
    Ok(settings)
}

/// Load proxy settings from a TOML file, or defaults when no file is given.
pub fn load_settings(path: Option<&Path>) -> Result<ProxySettings, ConfigError> {
    match path {
        Some(path) => parse_settings(&read(path)?),
        None => Ok(ProxySettings::default()),
    }
}
