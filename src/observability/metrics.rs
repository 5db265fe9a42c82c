//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sticky_requests_total` (counter): requests by service and outcome
//! - `sticky_request_duration_seconds` (histogram): latency by service
//! - `sticky_sessions_total` (counter): session lifecycle events by service
//! - `sticky_pool_available` (gauge): free upstreams per service
//! - `sticky_sessions_cached` (gauge): cached sessions per service
//! - `sticky_invariant_violations_total` (counter): refused pool/cache operations
//!
//! Outcome labels reuse `ProxyError::kind()`, so pool exhaustion and unknown
//! hosts are separate series.

use std::net::SocketAddr;
use std::time::Instant;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished request.
pub fn record_request(service: &str, outcome: &'static str, start: Instant) {
    ::metrics::counter!(
        "sticky_requests_total",
        "service" => service.to_owned(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!(
        "sticky_request_duration_seconds",
        "service" => service.to_owned()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a session lifecycle event (opened, closed, idle_expired, active_expired).
pub fn record_session_event(service: &str, event: &'static str) {
    ::metrics::counter!(
        "sticky_sessions_total",
        "service" => service.to_owned(),
        "event" => event
    )
    .increment(1);
}

pub fn record_pool_state(service: &str, available: usize, cached: usize) {
    ::metrics::gauge!("sticky_pool_available", "service" => service.to_owned()).set(available as f64);
    ::metrics::gauge!("sticky_sessions_cached", "service" => service.to_owned()).set(cached as f64);
}

pub fn record_invariant_violation(service: &str) {
    ::metrics::counter!(
        "sticky_invariant_violations_total",
        "service" => service.to_owned()
    )
    .increment(1);
}
