//! Per-request session handling and relay.
//!
//! # Flow
//! ```text
//! cookies ─┬─ lbc_session_id + lbc_close → close session, answer "session closed"
//!          ├─ lbc_session_id             → resume cached lease (or SessionNotFound)
//!          └─ none                       → wait for a free upstream, open a lease
//!     → buffer request body
//!     → same method + path/query to the leased upstream (bounded by a deadline)
//!     → buffer response body, answer with the session cookie
//!     → ActiveLease dropped: lease goes back to idle, stays cached
//! ```
//!
//! Upstream failures leave the session cached so a retry reaches the same
//! upstream. Whole bodies are held in memory, capped by `max_body_bytes`.

use axum::{
    body::Body,
    http::{header, Request, StatusCode, Uri},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;

use crate::config::ProxySettings;
use crate::error::ProxyError;
use crate::http::request::{self, SessionCookies};
use crate::http::response;
use crate::load_balancer::{ActiveLease, ServiceHandler};
use crate::observability::metrics;

enum Resolved {
    Leased(ActiveLease),
    Closed,
}

/// Resolves sessions and relays requests to leased upstreams.
pub struct RequestForwarder {
    client: Client<HttpConnector, Body>,
    acquire_timeout: Duration,
    upstream_timeout: Duration,
    max_body_bytes: usize,
    propagate_status: bool,
}

/// Flatten an error and its sources into one line.
fn describe(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl RequestForwarder {
    pub fn new(settings: &ProxySettings) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(settings.timeouts.upstream()));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            acquire_timeout: settings.timeouts.acquire(),
            upstream_timeout: settings.timeouts.upstream(),
            max_body_bytes: settings.forwarding.max_body_bytes,
            propagate_status: settings.forwarding.propagate_status,
        }
    }

    /// Handle one request for `service`. Never fails: errors become 500s.
    pub async fn forward(&self, service: &Arc<ServiceHandler>, request: Request<Body>) -> Response {
        let start = Instant::now();
        let request_id = request::request_id(&request).to_string();
        let cookies = SessionCookies::from_headers(request.headers());

        let lease = match self.resolve(service, &cookies).await {
            Ok(Resolved::Leased(lease)) => lease,
            Ok(Resolved::Closed) => {
                metrics::record_request(service.name(), "closed", start);
                return response::session_closed();
            }
            Err(e) => {
                return self.fail(service, &request_id, e, None, cookies.session_id.as_deref(), start)
            }
        };

        match self.relay(&lease, request).await {
            Ok(response) => {
                metrics::record_request(service.name(), "ok", start);
                response
            }
            Err(e) => self.fail(service, &request_id, e, Some(&lease), None, start),
        }
    }

    async fn resolve(
        &self,
        service: &Arc<ServiceHandler>,
        cookies: &SessionCookies,
    ) -> Result<Resolved, ProxyError> {
        match cookies.session_id.as_deref() {
            Some(id) if cookies.close => {
                service.close_session(id)?;
                Ok(Resolved::Closed)
            }
            Some(id) => service.resume_session(id).map(Resolved::Leased),
            None => service
                .open_session(self.acquire_timeout)
                .await
                .map(Resolved::Leased),
        }
    }

    async fn relay(&self, lease: &ActiveLease, request: Request<Body>) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| ProxyError::RequestBody(describe(&e)))?;

        let path = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        let uri: Uri = lease
            .upstream()
            .uri_for(path)
            .parse()
            .map_err(|e| ProxyError::Upstream(format!("new upstream request fail: {}", e)))?;

        let mut outbound = Request::builder().method(parts.method.clone()).uri(uri);
        if let Some(headers) = outbound.headers_mut() {
            response::copy_end_to_end(
                &parts.headers,
                headers,
                &[header::HOST, header::CONTENT_LENGTH],
            );
            request::strip_session_cookies(headers);
        }
        let outbound = outbound
            .body(Body::from(body))
            .map_err(|e| ProxyError::Upstream(format!("new upstream request fail: {}", e)))?;

        tracing::debug!(
            method = %parts.method,
            uri = %outbound.uri(),
            session = %lease.id(),
            "Forwarding request"
        );

        let exchange = async {
            let response = self
                .client
                .request(outbound)
                .await
                .map_err(|e| ProxyError::Upstream(describe(&e)))?;
            let (head, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
                .await
                .map_err(|e| ProxyError::Upstream(format!("read upstream body fail: {}", describe(&e))))?;
            Ok::<_, ProxyError>((head, body))
        };
        let (head, body) = time::timeout(self.upstream_timeout, exchange)
            .await
            .map_err(|_| ProxyError::UpstreamTimeout(self.upstream_timeout))??;

        let status = if self.propagate_status {
            head.status
        } else {
            StatusCode::OK
        };
        Ok(response::relayed(status, &head.headers, body, lease.id()))
    }

    fn fail(
        &self,
        service: &ServiceHandler,
        request_id: &str,
        err: ProxyError,
        lease: Option<&ActiveLease>,
        cookie_session: Option<&str>,
        start: Instant,
    ) -> Response {
        tracing::warn!(
            request_id = %request_id,
            service = %service.name(),
            session = lease.map(|l| l.id().as_str()).or(cookie_session).unwrap_or("-"),
            upstream = lease.map(|l| l.upstream().addr()).unwrap_or("-"),
            kind = err.kind(),
            error = %err,
            "Request failed"
        );
        metrics::record_request(service.name(), err.kind(), start);
        response::failure(err, lease.map(|l| l.id()))
    }
}
