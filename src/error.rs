//! Request-level error taxonomy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

/// Everything that can stop a request from being relayed.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The Host header matches no configured virtual host.
    #[error("fail to get service: {0}")]
    UnknownService(String),

    /// A session cookie was presented but is not (or no longer) cached.
    /// The id is kept for logs only; the client already has it.
    #[error("session not found; retry without the lbc_session_id cookie")]
    SessionNotFound(String),

    /// No upstream became free within the acquisition deadline.
    #[error("no free upstream for {service} after {waited:?}")]
    PoolExhausted { service: String, waited: Duration },

    /// The inbound body could not be buffered.
    #[error("fail to read body: {0}")]
    RequestBody(String),

    /// Connecting to, sending to, or reading from the upstream failed.
    #[error("call upstream failed: {0}")]
    Upstream(String),

    /// The upstream round trip exceeded its deadline.
    #[error("upstream did not answer within {0:?}")]
    UpstreamTimeout(Duration),

    /// Pool/cache bookkeeping refused an operation that would corrupt it.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl ProxyError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::UnknownService(_) => "unknown_service",
            ProxyError::SessionNotFound(_) => "session_not_found",
            ProxyError::PoolExhausted { .. } => "pool_exhausted",
            ProxyError::RequestBody(_) => "request_body",
            ProxyError::Upstream(_) => "upstream_error",
            ProxyError::UpstreamTimeout(_) => "upstream_timeout",
            ProxyError::InvariantViolation(_) => "invariant_violation",
        }
    }

    /// Whether the session survives this failure and can be retried as-is.
    pub fn keeps_session(&self) -> bool {
        matches!(
            self,
            ProxyError::RequestBody(_) | ProxyError::Upstream(_) | ProxyError::UpstreamTimeout(_)
        )
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_for_capacity_and_routing() {
        let unknown = ProxyError::UnknownService("x.local".into());
        let exhausted = ProxyError::PoolExhausted {
            service: "x.local".into(),
            waited: Duration::from_secs(1),
        };
        let missing = ProxyError::SessionNotFound("abc".into());

        assert_ne!(unknown.kind(), exhausted.kind());
        assert_ne!(missing.kind(), exhausted.kind());
        assert!(!exhausted.keeps_session());
        assert!(ProxyError::Upstream("refused".into()).keeps_session());
    }

    #[test]
    fn missing_session_body_does_not_echo_the_cookie() {
        let err = ProxyError::SessionNotFound("<script>".into());
        assert!(!err.to_string().contains("<script>"));
    }

    #[test]
    fn every_failure_is_a_server_error() {
        let response = ProxyError::UnknownService("x.local".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
