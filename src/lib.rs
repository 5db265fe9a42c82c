//! Sticky-session HTTP reverse proxy library.
//!
//! Each virtual host owns a fixed set of upstreams. A client without a
//! session cookie is leased one free upstream exclusively; later requests
//! carrying the cookie go back to it until the session is closed or expires.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod routing;

pub use config::{ProxySettings, ServiceMap};
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
