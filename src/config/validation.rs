//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every virtual host has at least one well-formed upstream
//! - Validate value ranges (timeouts > 0, TTLs > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use crate::config::schema::{ProxySettings, ServiceMap, PLACEHOLDER_API_KEY};
use crate::routing::matcher::normalize_host;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field.
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

/// Check that `addr` is a `host:port` pair.
fn check_upstream_addr(addr: &str) -> Result<(), String> {
    if addr.contains('/') {
        return Err(format!("'{}' must be host:port without scheme or path", addr));
    }
    let url = Url::parse(&format!("http://{}", addr))
        .map_err(|e| format!("'{}' is not a valid address: {}", addr, e))?;
    if url.host_str().is_none() {
        return Err(format!("'{}' has no host", addr));
    }
    // `port()` is None both for a missing port and for the scheme default.
    if url.port().is_none() && !addr.ends_with(":80") {
        return Err(format!("'{}' has no port", addr));
    }
    Ok(())
}

/// Validate the services map.
pub fn validate_services(services: &ServiceMap) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if services.is_empty() {
        errors.push(ValidationError::new("services", "no virtual hosts configured"));
    }

    // Routing keys are case-insensitive, so names equal after
    // normalisation would share one slot and drop the other's upstreams.
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();

    for (host, service) in services {
        if host.trim().is_empty() {
            errors.push(ValidationError::new("services", "empty virtual host name"));
        }
        if let Some(first) = seen.insert(normalize_host(host), host.as_str()) {
            errors.push(ValidationError::new(
                host.clone(),
                format!("same virtual host as '{}' (host names are case-insensitive)", first),
            ));
        }
        if service.upstreams.is_empty() {
            errors.push(ValidationError::new(
                format!("{}.upstreams", host),
                "at least one upstream is required",
            ));
        }
        for (i, upstream) in service.upstreams.iter().enumerate() {
            if let Err(message) = check_upstream_addr(&upstream.addr) {
                errors.push(ValidationError::new(
                    format!("{}.upstreams[{}].addr", host, i),
                    message,
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate proxy settings.
pub fn validate_settings(settings: &ProxySettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive = [
        ("sessions.sweep_interval_secs", settings.sessions.sweep_interval_secs),
        ("sessions.idle_ttl_secs", settings.sessions.idle_ttl_secs),
        ("sessions.active_ttl_secs", settings.sessions.active_ttl_secs),
        ("timeouts.acquire_ms", settings.timeouts.acquire_ms),
        ("timeouts.upstream_ms", settings.timeouts.upstream_ms),
        ("forwarding.max_body_bytes", settings.forwarding.max_body_bytes as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if settings.admin.enabled {
        if settings.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
        } else if settings.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "still the default placeholder; set a real key",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
