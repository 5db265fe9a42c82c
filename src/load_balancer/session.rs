//! Session leases and the per-host session cache.
//!
//! # Responsibilities
//! - Generate session identifiers
//! - Track which upstream a session holds and whether requests are in flight
//! - Map session identifiers to leases (lookup / insert / remove)
//! - Classify leases against an expiry policy for the sweep
//!
//! The cache is plain data; `ServiceHandler` owns it behind the host lock.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::ProxyError;
use crate::load_balancer::backend::UpstreamEndpoint;
use crate::load_balancer::eviction::{Expiry, ExpiryPolicy};

/// Opaque session identifier carried in the `lbc_session_id` cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier from a random (v4) UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A session's exclusive binding to one upstream endpoint.
#[derive(Debug, Clone)]
pub struct Lease {
    pub id: SessionId,
    pub upstream: Arc<UpstreamEndpoint>,
    /// Set once; all expiry is measured from here.
    pub created_at: Instant,
    in_flight: u32,
}

impl Lease {
    /// A new, idle lease.
    pub fn new(id: SessionId, upstream: Arc<UpstreamEndpoint>, created_at: Instant) -> Self {
        Self {
            id,
            upstream,
            created_at,
            in_flight: 0,
        }
    }

    /// True while at least one request is being forwarded on this lease.
    pub fn is_active(&self) -> bool {
        self.in_flight > 0
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    /// Mark one more request in flight.
    pub fn begin(&mut self) {
        self.in_flight = self.in_flight.saturating_add(1);
    }

    /// Mark one request finished.
    pub fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Clear every in-flight mark (force reclaim).
    pub fn deactivate(&mut self) {
        self.in_flight = 0;
    }

    /// Time since creation, saturating at zero.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// Session identifier → lease, for one virtual host.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: HashMap<SessionId, Lease>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, id: &str) -> Option<&Lease> {
        self.entries.get(id)
    }

    pub fn lookup_mut(&mut self, id: &str) -> Option<&mut Lease> {
        self.entries.get_mut(id)
    }

    /// Insert a lease under its own identifier. Overwriting is refused.
    pub fn insert(&mut self, lease: Lease) -> Result<(), ProxyError> {
        if self.entries.contains_key(&lease.id) {
            return Err(ProxyError::InvariantViolation(format!(
                "duplicate session id {}",
                lease.id
            )));
        }
        self.entries.insert(lease.id.clone(), lease);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Lease> {
        self.entries.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lease> {
        self.entries.values()
    }

    /// Leases the policy says must be reclaimed at `now`, without mutating.
    pub fn expired(&self, now: Instant, policy: &ExpiryPolicy) -> Vec<(SessionId, Expiry)> {
        self.entries
            .values()
            .filter_map(|lease| policy.classify(lease, now).map(|e| (lease.id.clone(), e)))
            .collect()
    }
}
