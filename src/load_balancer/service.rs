//! Per-virtual-host session state.
//!
//! # Responsibilities
//! - Keep the upstream pool and the session cache of one host under one lock
//! - Block new sessions until an upstream is free (fair, bounded wait)
//! - Resume, close, and sweep sessions
//! - Track in-flight requests through an RAII guard
//!
//! # Invariants
//! - An endpoint is either free in the pool or held by exactly one cached
//!   lease; every move between the two happens inside one critical section
//! - Free permits on the gate never exceed free endpoints in the pool
//! - The lock is never held across an await point

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{self, Instant};

use crate::error::ProxyError;
use crate::load_balancer::backend::UpstreamEndpoint;
use crate::load_balancer::eviction::{Expiry, ExpiryPolicy};
use crate::load_balancer::pool::UpstreamPool;
use crate::load_balancer::session::{Lease, SessionCache, SessionId};
use crate::observability::metrics;

struct HostState {
    pool: UpstreamPool,
    cache: SessionCache,
}

/// Pool, cache and expiry policy of one virtual host.
pub struct ServiceHandler {
    name: String,
    state: Mutex<HostState>,
    /// One permit per free endpoint. Tokio's semaphore queues waiters FIFO.
    available: Semaphore,
    policy: ExpiryPolicy,
}

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub idle_expired: usize,
    pub active_expired: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.idle_expired + self.active_expired
    }
}

/// Point-in-time view of one session, for the admin API and tests.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub upstream: String,
    pub active: bool,
    pub age_secs: u64,
}

/// Point-in-time view of one virtual host.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSnapshot {
    pub name: String,
    pub capacity: usize,
    pub available: usize,
    pub sessions: Vec<SessionSnapshot>,
}

impl ServiceSnapshot {
    pub fn session(&self, id: &str) -> Option<&SessionSnapshot> {
        self.sessions.iter().find(|s| s.id == id)
    }
}

impl ServiceHandler {
    /// Build the host state; every configured address starts free.
    pub fn new<I, S>(name: impl Into<String>, addrs: I, policy: ExpiryPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let addrs: Vec<String> = addrs.into_iter().map(Into::into).collect();
        for addr in &addrs {
            tracing::debug!(service = %name, upstream = %addr, "Upstream registered");
        }
        let pool = UpstreamPool::new(addrs);
        let available = Semaphore::new(pool.capacity());
        metrics::record_pool_state(&name, pool.available(), 0);

        Self {
            name,
            state: Mutex::new(HostState {
                pool,
                cache: SessionCache::new(),
            }),
            available,
            policy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log and count a refused bookkeeping operation.
    fn violation(&self, err: ProxyError) -> ProxyError {
        tracing::error!(target: "invariant", service = %self.name, error = %err, "Pool/cache invariant violated");
        metrics::record_invariant_violation(&self.name);
        err
    }

    /// Return a removed lease's endpoint to the pool. Caller must hand the
    /// returned permit count to `self.available` after unlocking.
    fn reclaim(&self, state: &mut HostState, lease: Lease) -> usize {
        match state.pool.release(lease.upstream) {
            Ok(()) => 1,
            Err(e) => {
                self.violation(e);
                0
            }
        }
    }

    fn publish(&self, state: &HostState) {
        metrics::record_pool_state(&self.name, state.pool.available(), state.cache.len());
    }

    /// Bind a new session to a free upstream, waiting up to `wait` for one.
    ///
    /// The returned guard already counts as one in-flight request.
    pub async fn open_session(self: &Arc<Self>, wait: Duration) -> Result<ActiveLease, ProxyError> {
        let permit = match time::timeout(wait, self.available.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(self.violation(ProxyError::InvariantViolation(
                    "upstream gate closed".into(),
                )))
            }
            Err(_) => {
                tracing::warn!(service = %self.name, waited = ?wait, "No free upstream");
                return Err(ProxyError::PoolExhausted {
                    service: self.name.clone(),
                    waited: wait,
                });
            }
        };
        // The permit now stands for the endpoint we are about to take.
        permit.forget();

        let mut state = self.lock();
        let Some(upstream) = state.pool.take() else {
            return Err(self.violation(ProxyError::InvariantViolation(
                "permit granted with no free upstream".into(),
            )));
        };

        let mut lease = Lease::new(SessionId::generate(), upstream.clone(), Instant::now());
        lease.begin();
        let id = lease.id.clone();

        if let Err(e) = state.cache.insert(lease) {
            let returned = match state.pool.release(upstream) {
                Ok(()) => 1,
                Err(release_err) => {
                    self.violation(release_err);
                    0
                }
            };
            drop(state);
            self.available.add_permits(returned);
            return Err(self.violation(e));
        }
        self.publish(&state);
        drop(state);

        tracing::info!(service = %self.name, session = %id, upstream = %upstream.addr(), "Session opened");
        metrics::record_session_event(&self.name, "opened");

        Ok(ActiveLease {
            service: Arc::clone(self),
            id,
            upstream,
        })
    }

    /// Mark a request in flight on an existing session.
    pub fn resume_session(self: &Arc<Self>, id: &str) -> Result<ActiveLease, ProxyError> {
        let resumed = self.lock().cache.lookup_mut(id).map(|lease| {
            lease.begin();
            (lease.id.clone(), lease.upstream.clone())
        });

        match resumed {
            Some((id, upstream)) => Ok(ActiveLease {
                service: Arc::clone(self),
                id,
                upstream,
            }),
            None => {
                tracing::info!(service = %self.name, session = %id, "Fail to find session");
                Err(ProxyError::SessionNotFound(id.to_string()))
            }
        }
    }

    /// End a session now, whatever its activity, and free its upstream.
    pub fn close_session(&self, id: &str) -> Result<Lease, ProxyError> {
        let mut state = self.lock();
        let Some(lease) = state.cache.remove(id) else {
            return Err(ProxyError::SessionNotFound(id.to_string()));
        };
        let closed = lease.clone();
        let returned = self.reclaim(&mut state, lease);
        self.publish(&state);
        drop(state);
        self.available.add_permits(returned);

        tracing::info!(service = %self.name, session = %id, upstream = %closed.upstream.addr(), "Session closed");
        metrics::record_session_event(&self.name, "closed");
        Ok(closed)
    }

    /// Reclaim every lease the expiry policy rejects at `now`.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let mut freed = Vec::new();

        let mut state = self.lock();
        let expired = state.cache.expired(now, &self.policy);
        let mut returned = 0;
        for (id, expiry) in expired {
            let Some(mut lease) = state.cache.remove(id.as_str()) else {
                continue;
            };
            if expiry == Expiry::Active {
                lease.deactivate();
                report.active_expired += 1;
            } else {
                report.idle_expired += 1;
            }
            freed.push((id, lease.upstream.clone(), expiry));
            returned += self.reclaim(&mut state, lease);
        }
        if report.total() > 0 {
            self.publish(&state);
        }
        drop(state);
        self.available.add_permits(returned);

        for (id, upstream, expiry) in freed {
            match expiry {
                Expiry::Active => tracing::warn!(
                    service = %self.name, session = %id, upstream = %upstream.addr(),
                    "Force-reclaimed stuck session"
                ),
                Expiry::Idle => tracing::info!(
                    service = %self.name, session = %id, upstream = %upstream.addr(),
                    "Free upstream of expired session"
                ),
            }
            metrics::record_session_event(&self.name, expiry.as_str());
        }
        report
    }

    fn finish(&self, id: &SessionId) {
        let mut state = self.lock();
        if let Some(lease) = state.cache.lookup_mut(id.as_str()) {
            lease.finish();
        }
    }

    pub fn snapshot(&self, now: Instant) -> ServiceSnapshot {
        let state = self.lock();
        let mut sessions: Vec<_> = state
            .cache
            .iter()
            .map(|lease| SessionSnapshot {
                id: lease.id.to_string(),
                upstream: lease.upstream.addr().to_string(),
                active: lease.is_active(),
                age_secs: lease.age(now).as_secs(),
            })
            .collect();
        sessions.sort_by(|a, b| b.age_secs.cmp(&a.age_secs));

        ServiceSnapshot {
            name: self.name.clone(),
            capacity: state.pool.capacity(),
            available: state.pool.available(),
            sessions,
        }
    }
}

/// One in-flight request on a lease; marks the request finished on drop.
///
/// Dropping covers normal completion, every error path, and the handler
/// future being cancelled when the client goes away.
#[derive(Debug)]
pub struct ActiveLease {
    service: Arc<ServiceHandler>,
    id: SessionId,
    upstream: Arc<UpstreamEndpoint>,
}

impl ActiveLease {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn upstream(&self) -> &UpstreamEndpoint {
        &self.upstream
    }
}

impl Drop for ActiveLease {
    fn drop(&mut self) {
        self.service.finish(&self.id);
    }
}

impl std::fmt::Debug for ServiceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandler")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
