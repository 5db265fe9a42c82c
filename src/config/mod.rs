//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! services file (JSON) ─┐
//! settings file (TOML) ─┼→ loader.rs (parse & deserialize)
//! CLI overrides ────────┘   → validation.rs (semantic checks)
//!                           → ServiceMap + ProxySettings (validated, immutable)
//!                           → shared to subsystems at startup
//! ```
//!
//! # Design Decisions
//! - Config is read once; there is no hot reload because live sessions are
//!   bound to the pool built from it
//! - All settings have defaults to allow a services file alone
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    AdminConfig, ForwardingConfig, ListenerConfig, ObservabilityConfig, ProxySettings,
    ServiceConfig, ServiceMap, SessionConfig, TimeoutConfig, UpstreamConfig,
};
