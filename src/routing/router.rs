//! Virtual host lookup.
//!
//! # Responsibilities
//! - Own one `ServiceHandler` per configured virtual host
//! - Resolve a request's host to its handler, or fail as unknown service
//! - Start one eviction scheduler per host
//!
//! # Design Decisions
//! - Immutable after construction (the map itself needs no lock)
//! - O(1) host lookup via HashMap
//! - Explicit unknown-service error rather than a default host

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::{ServiceMap, SessionConfig};
use crate::error::ProxyError;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{EvictionScheduler, ExpiryPolicy, ServiceHandler};
use crate::routing::matcher::{normalize_host, strip_port};

/// Maps virtual host names to their session state.
#[derive(Debug)]
pub struct ServiceRouter {
    services: HashMap<String, Arc<ServiceHandler>>,
    sweep_interval: Duration,
}

impl ServiceRouter {
    /// Build one handler per configured host.
    pub fn from_config(services: &ServiceMap, sessions: &SessionConfig) -> Self {
        let policy = ExpiryPolicy::from(sessions);
        let services = services
            .iter()
            .map(|(host, service)| {
                let key = normalize_host(host);
                tracing::info!(
                    service = %key,
                    upstreams = service.upstreams.len(),
                    "Registering virtual host"
                );
                let handler = ServiceHandler::new(
                    key.clone(),
                    service.upstreams.iter().map(|u| u.addr.clone()),
                    policy,
                );
                (key, Arc::new(handler))
            })
            .collect();

        Self {
            services,
            sweep_interval: sessions.sweep_interval(),
        }
    }

    /// Find the handler for a request's host.
    pub fn resolve(&self, host: Option<&str>) -> Result<Arc<ServiceHandler>, ProxyError> {
        let Some(host) = host else {
            return Err(ProxyError::UnknownService(String::new()));
        };
        let key = normalize_host(host);
        self.services
            .get(&key)
            .or_else(|| strip_port(&key).and_then(|bare| self.services.get(bare)))
            .cloned()
            .ok_or_else(|| ProxyError::UnknownService(host.to_string()))
    }

    /// Exact lookup by configured name.
    pub fn get(&self, name: &str) -> Option<&Arc<ServiceHandler>> {
        self.services.get(&normalize_host(name))
    }

    /// All handlers, sorted by name.
    pub fn services(&self) -> Vec<Arc<ServiceHandler>> {
        let mut all: Vec<_> = self.services.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Spawn the per-host eviction schedulers; they stop on `shutdown`.
    pub fn spawn_eviction(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        self.services
            .values()
            .map(|service| {
                EvictionScheduler::new(service.clone(), self.sweep_interval)
                    .spawn(shutdown.subscribe())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServiceConfig, UpstreamConfig};

    fn router() -> ServiceRouter {
        let mut services = ServiceMap::new();
        services.insert(
            "svc.local".into(),
            ServiceConfig {
                upstreams: vec![
                    UpstreamConfig { addr: "127.0.0.1:3001".into() },
                    UpstreamConfig { addr: "127.0.0.1:3002".into() },
                ],
            },
        );
        services.insert(
            "api.local:9000".into(),
            ServiceConfig {
                upstreams: vec![UpstreamConfig { addr: "127.0.0.1:4001".into() }],
            },
        );
        ServiceRouter::from_config(&services, &SessionConfig::default())
    }

    #[test]
    fn resolves_case_insensitively() {
        let router = router();
        assert_eq!(router.resolve(Some("SVC.local")).unwrap().name(), "svc.local");
    }

    #[test]
    fn falls_back_to_host_without_port() {
        let router = router();
        assert_eq!(router.resolve(Some("svc.local:8070")).unwrap().name(), "svc.local");
        assert_eq!(router.resolve(Some("api.local:9000")).unwrap().name(), "api.local:9000");
        assert!(router.resolve(Some("api.local")).is_err());
    }

    #[test]
    fn unknown_host_is_routing_error() {
        let router = router();
        let err = router.resolve(Some("nope.local")).unwrap_err();
        assert!(matches!(err, ProxyError::UnknownService(ref h) if h == "nope.local"));
        assert_eq!(err.kind(), "unknown_service");
        assert!(router.resolve(None).is_err());
    }

    #[test]
    fn each_host_gets_its_own_pool() {
        let router = router();
        assert_eq!(router.len(), 2);
        let names: Vec<_> = router.services().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["api.local:9000", "svc.local"]);
        let svc = router.get("svc.local").unwrap();
        assert_eq!(svc.snapshot(tokio::time::Instant::now()).capacity, 2);
    }

    #[tokio::test]
    async fn schedulers_stop_with_shutdown() {
        let router = router();
        let shutdown = Shutdown::new();
        let handles = router.spawn_eviction(&shutdown);
        assert_eq!(handles.len(), 2);

        shutdown.trigger();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
