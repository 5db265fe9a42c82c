//! Configuration schema definitions.
//!
//! Two documents feed the proxy:
//! - the services map (JSON), one entry per virtual host listing its upstreams;
//! - the proxy settings (TOML), every field optional.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Virtual host name → upstream set, as read from the services file.
pub type ServiceMap = BTreeMap<String, ServiceConfig>;

/// Static configuration of one virtual host.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Upstream servers sharing this host's traffic.
    pub upstreams: Vec<UpstreamConfig>,
}

/// One upstream entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub addr: String,
}

/// Root tunables for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxySettings {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Session lifetime and sweep cadence.
    pub sessions: SessionConfig,

    /// Pool wait and upstream call deadlines.
    pub timeouts: TimeoutConfig,

    /// Request/response relay behaviour.
    pub forwarding: ForwardingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8070").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8070".to_string(),
        }
    }
}

/// Session expiry configuration.
///
/// Both TTLs are measured from session creation, not from last use.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Period of the eviction sweep in seconds.
    pub sweep_interval_secs: u64,

    /// Idle sessions older than this are reclaimed.
    pub idle_ttl_secs: u64,

    /// Sessions still marked in flight after this long are force-reclaimed.
    pub active_ttl_secs: u64,
}

impl SessionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 3,
            idle_ttl_secs: 120,
            active_ttl_secs: 300,
        }
    }
}

/// Timeout configuration, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Longest a new session waits for a free upstream.
    pub acquire_ms: u64,

    /// Deadline for the whole upstream round trip (send + read body).
    pub upstream_ms: u64,
}

impl TimeoutConfig {
    pub fn acquire(&self) -> Duration {
        Duration::from_millis(self.acquire_ms)
    }

    pub fn upstream(&self) -> Duration {
        Duration::from_millis(self.upstream_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            acquire_ms: 30_000,
            upstream_ms: 30_000,
        }
    }
}

/// Forwarding behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Maximum buffered size of a request or response body.
    pub max_body_bytes: usize,

    /// Relay the upstream status code instead of always answering 200.
    pub propagate_status: bool,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            propagate_status: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Default admin key; refused by validation when the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8071".to_string(),
        }
    }
}
