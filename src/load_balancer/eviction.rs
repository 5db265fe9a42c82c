//! Periodic session eviction.
//!
//! # Responsibilities
//! - Decide when a lease has outlived its policy
//! - Sweep one virtual host on a fixed period
//! - Stop when the proxy shuts down
//!
//! # Policy
//! ```text
//! active && age > active_ttl  → force-reclaim (stuck request)
//! idle   && age > idle_ttl    → reclaim (session expired)
//! otherwise                   → keep
//! ```
//! Age is measured from lease creation; reuse does not refresh it.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::SessionConfig;
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::service::ServiceHandler;
use crate::load_balancer::session::Lease;

/// Why a lease is being reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Idle longer than the idle TTL.
    Idle,
    /// Still in flight after the active TTL.
    Active,
}

impl Expiry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Expiry::Idle => "idle_expired",
            Expiry::Active => "active_expired",
        }
    }
}

/// Expiry windows, both measured from lease creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub idle_ttl: Duration,
    pub active_ttl: Duration,
}

impl ExpiryPolicy {
    pub fn new(idle_ttl: Duration, active_ttl: Duration) -> Self {
        Self { idle_ttl, active_ttl }
    }

    /// `None` means keep the lease.
    pub fn classify(&self, lease: &Lease, now: Instant) -> Option<Expiry> {
        let age = lease.age(now);
        if lease.is_active() {
            (age > self.active_ttl).then_some(Expiry::Active)
        } else {
            (age > self.idle_ttl).then_some(Expiry::Idle)
        }
    }
}

impl From<&SessionConfig> for ExpiryPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self::new(
            Duration::from_secs(config.idle_ttl_secs),
            Duration::from_secs(config.active_ttl_secs),
        )
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// Background sweeper bound to one virtual host.
pub struct EvictionScheduler {
    service: Arc<ServiceHandler>,
    period: Duration,
}

impl EvictionScheduler {
    pub fn new(service: Arc<ServiceHandler>, period: Duration) -> Self {
        Self { service, period }
    }

    /// Run on the current runtime until `shutdown` fires.
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            service = %self.service.name(),
            period = ?self.period,
            "Eviction scheduler starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.service.sweep(Instant::now());
                    tracing::debug!(
                        service = %self.service.name(),
                        idle_expired = report.idle_expired,
                        active_expired = report.active_expired,
                        "Sweep finished"
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!(
                        service = %self.service.name(),
                        "Eviction scheduler received shutdown signal, exiting loop"
                    );
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::load_balancer::backend::UpstreamEndpoint;
    use crate::load_balancer::session::SessionId;

    fn lease_at(created_at: Instant) -> Lease {
        Lease::new(
            SessionId::generate(),
            Arc::new(UpstreamEndpoint::new(0, "a:1")),
            created_at,
        )
    }

    #[test]
    fn asymmetric_windows() {
        let policy = ExpiryPolicy::default();
        let t0 = Instant::now();
        let mut lease = lease_at(t0);

        assert_eq!(policy.classify(&lease, t0 + Duration::from_secs(120)), None);
        assert_eq!(
            policy.classify(&lease, t0 + Duration::from_secs(121)),
            Some(Expiry::Idle)
        );

        lease.begin();
        assert_eq!(policy.classify(&lease, t0 + Duration::from_secs(121)), None);
        assert_eq!(policy.classify(&lease, t0 + Duration::from_secs(300)), None);
        assert_eq!(
            policy.classify(&lease, t0 + Duration::from_secs(301)),
            Some(Expiry::Active)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_reclaims_idle_sessions() {
        let service = Arc::new(ServiceHandler::new(
            "svc.local",
            ["a:1"],
            ExpiryPolicy::default(),
        ));
        let shutdown = Shutdown::new();
        let handle = EvictionScheduler::new(service.clone(), Duration::from_secs(3))
            .spawn(shutdown.subscribe());

        let lease = service.open_session(Duration::from_secs(1)).await.unwrap();
        let id = lease.id().clone();
        drop(lease);

        time::sleep(Duration::from_secs(60)).await;
        assert!(service.snapshot(Instant::now()).session(id.as_str()).is_some());

        time::sleep(Duration::from_secs(64)).await;
        let snapshot = service.snapshot(Instant::now());
        assert!(snapshot.session(id.as_str()).is_none());
        assert_eq!(snapshot.available, 1);

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_force_reclaims_stuck_sessions() {
        let service = Arc::new(ServiceHandler::new(
            "svc.local",
            ["a:1"],
            ExpiryPolicy::default(),
        ));
        let shutdown = Shutdown::new();
        let handle = EvictionScheduler::new(service.clone(), Duration::from_secs(3))
            .spawn(shutdown.subscribe());

        // Never dropped while the clock runs: the request looks stuck.
        let stuck = service.open_session(Duration::from_secs(1)).await.unwrap();

        time::sleep(Duration::from_secs(200)).await;
        assert_eq!(service.snapshot(Instant::now()).sessions.len(), 1);

        time::sleep(Duration::from_secs(104)).await;
        let snapshot = service.snapshot(Instant::now());
        assert!(snapshot.sessions.is_empty());
        assert_eq!(snapshot.available, 1);

        // Finishing after reclamation must not resurrect anything.
        drop(stuck);
        assert_eq!(service.snapshot(Instant::now()).available, 1);

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_stops_on_shutdown() {
        let service = Arc::new(ServiceHandler::new("svc.local", ["a:1"], ExpiryPolicy::default()));
        let shutdown = Shutdown::new();
        let handle = EvictionScheduler::new(service, Duration::from_secs(3)).spawn(shutdown.subscribe());

        shutdown.trigger();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
