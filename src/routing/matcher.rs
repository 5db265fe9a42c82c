//! Virtual host extraction and normalisation.
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - The `Host` header wins; absolute-form request URIs are the fallback
//! - A port is only stripped as a second lookup attempt, so services keyed
//!   as `host:port` still match exactly

use axum::http::{header, Request};

/// The routing key a request asks for, if any.
pub fn request_host<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())
        .map(str::trim)
        .filter(|h| !h.is_empty())
}

/// Lowercase form used as the routing key.
pub fn normalize_host(host: &str) -> String {
    host.trim().to_ascii_lowercase()
}

/// `host` without a trailing `:port`, or `None` when there is no port.
/// Bracketed IPv6 literals keep their brackets.
pub fn strip_port(host: &str) -> Option<&str> {
    let (name, port) = host.rsplit_once(':')?;
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Bare IPv6 without brackets: the colon is part of the address.
    if name.contains(':') && !name.ends_with(']') {
        return None;
    }
    Some(name)
}
