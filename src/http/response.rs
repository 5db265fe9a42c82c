//! Response construction.
//!
//! # Responsibilities
//! - Relay a buffered upstream response with the session cookie
//! - Answer session-close requests
//! - Map failures to 500 responses with a readable message
//! - Filter hop-by-hop headers in both directions

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::ProxyError;
use crate::http::request::SESSION_COOKIE;
use crate::load_balancer::SessionId;

/// Connection-scoped headers that must not be forwarded (RFC 9110 §7.6.1).
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Copy end-to-end headers, skipping hop-by-hop ones, anything the
/// `Connection` header names, and the listed extras.
pub fn copy_end_to_end(src: &HeaderMap, dst: &mut HeaderMap, skip: &[HeaderName]) {
    let named_by_connection: Vec<String> = src
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .collect();

    for (name, value) in src {
        if is_hop_by_hop(name)
            || skip.contains(name)
            || named_by_connection.iter().any(|t| t == name.as_str())
        {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// `Set-Cookie` value binding the client to `id`.
pub fn session_cookie(id: &SessionId) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{}={}; Path=/", SESSION_COOKIE, id)).ok()
}

/// `Set-Cookie` value telling the client to forget its session.
pub fn expired_session_cookie() -> HeaderValue {
    HeaderValue::from_static("lbc_session_id=; Path=/; Max-Age=0")
}

fn attach_session(response: &mut Response, id: &SessionId) {
    match session_cookie(id) {
        Some(cookie) => {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        None => tracing::error!(session = %id, "Session id is not a valid cookie value"),
    }
}

/// Build the client response from a buffered upstream response.
pub fn relayed(status: StatusCode, upstream_headers: &HeaderMap, body: Bytes, id: &SessionId) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    copy_end_to_end(upstream_headers, response.headers_mut(), &[header::CONTENT_LENGTH]);
    attach_session(&mut response, id);
    response
}

/// Reply to an explicit close.
pub fn session_closed() -> Response {
    let mut response = (StatusCode::OK, "session closed").into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, expired_session_cookie());
    response
}

/// 500 response for `err`. When the session survives the failure the client
/// keeps its cookie so a retry reaches the same upstream.
pub fn failure(err: ProxyError, session: Option<&SessionId>) -> Response {
    let keeps_session = err.keeps_session();
    let mut response = err.into_response();
    if let (true, Some(id)) = (keeps_session, session) {
        attach_session(&mut response, id);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relayed_response_carries_session_cookie() {
        let id = SessionId::generate();
        let mut upstream = HeaderMap::new();
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        upstream.insert(header::CONTENT_LENGTH, HeaderValue::from_static("5"));
        upstream.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let response = relayed(StatusCode::OK, &upstream, Bytes::from_static(b"hello"), &id);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with(&format!("lbc_session_id={}", id)));
    }

    #[test]
    fn connection_named_headers_are_dropped() {
        let mut src = HeaderMap::new();
        src.insert(header::CONNECTION, HeaderValue::from_static("close, X-Trace-Hop"));
        src.insert("x-trace-hop", HeaderValue::from_static("1"));
        src.insert("x-kept", HeaderValue::from_static("1"));

        let mut dst = HeaderMap::new();
        copy_end_to_end(&src, &mut dst, &[]);
        assert!(dst.get("x-trace-hop").is_none());
        assert!(dst.get(header::CONNECTION).is_none());
        assert_eq!(dst["x-kept"], "1");
    }

    #[test]
    fn upstream_failure_keeps_cookie() {
        let id = SessionId::generate();
        let response = failure(ProxyError::Upstream("connection refused".into()), Some(&id));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::SET_COOKIE).is_some());
    }

    #[test]
    fn session_failures_set_no_cookie() {
        let id = SessionId::generate();
        let response = failure(ProxyError::SessionNotFound(id.to_string()), Some(&id));
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[test]
    fn close_expires_cookie() {
        let response = session_closed();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }
}
