//! Request inspection and preparation.
//!
//! # Responsibilities
//! - Read the session cookies (`lbc_session_id`, `lbc_close`)
//! - Strip those cookies before the request goes upstream
//! - Request ID generation and propagation (`x-request-id`)

use axum::http::{header, HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "lbc_session_id";

/// Cookie whose presence asks the proxy to end the session.
pub const CLOSE_COOKIE: &str = "lbc_close";

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Session-related cookies found on an inbound request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionCookies {
    /// First non-empty `lbc_session_id` value.
    pub session_id: Option<String>,
    /// Whether `lbc_close` is present (any value).
    pub close: bool,
}

impl SessionCookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::default();
        for (name, value) in cookie_pairs(headers) {
            match name {
                SESSION_COOKIE if cookies.session_id.is_none() && !value.is_empty() => {
                    cookies.session_id = Some(value.to_string());
                }
                CLOSE_COOKIE => cookies.close = true,
                _ => {}
            }
        }
        cookies
    }
}

/// Every `name=value` pair across all `Cookie` headers.
fn cookie_pairs(headers: &HeaderMap) -> impl Iterator<Item = (&str, &str)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            Some((name.trim(), value.trim().trim_matches('"')))
        })
}

/// Remove the proxy's own cookies, keeping any others for the upstream.
pub fn strip_session_cookies(headers: &mut HeaderMap) {
    let kept: Vec<String> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .filter(|pair| {
            let name = pair.split_once('=').map_or(*pair, |(n, _)| n).trim();
            !pair.is_empty() && name != SESSION_COOKIE && name != CLOSE_COOKIE
        })
        .map(str::to_string)
        .collect();

    headers.remove(header::COOKIE);
    if kept.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&kept.join("; ")) {
        headers.insert(header::COOKIE, value);
    }
}

/// Request ID attached by the tower-http layer, or "unknown".
pub fn request_id<B>(req: &Request<B>) -> &str {
    req.headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Layer assigning a UUID `x-request-id` to requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer copying `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}
