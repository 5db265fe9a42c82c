//! Upstream pool bookkeeping.
//!
//! # Responsibilities
//! - Hold the upstream endpoints of one virtual host that no session leases
//! - Hand them out in FIFO order
//! - Refuse releases that would break exclusivity or exceed capacity
//!
//! Waiting for a free endpoint is not done here: `ServiceHandler` gates
//! `take` behind a fair semaphore so the pool itself stays plain data that
//! lives under the host lock together with the session cache.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::ProxyError;
use crate::load_balancer::backend::UpstreamEndpoint;

/// Bounded multiset of free upstream endpoints.
#[derive(Debug)]
pub struct UpstreamPool {
    /// Every endpoint this pool was built with, indexed by slot.
    members: Vec<Arc<UpstreamEndpoint>>,
    /// Endpoints currently free, oldest release first.
    free: VecDeque<Arc<UpstreamEndpoint>>,
}

impl UpstreamPool {
    /// Create a pool whose capacity is the number of configured addresses.
    pub fn new<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<_> = addrs
            .into_iter()
            .enumerate()
            .map(|(slot, addr)| Arc::new(UpstreamEndpoint::new(slot, addr)))
            .collect();
        let free = members.iter().cloned().collect();
        Self { members, free }
    }

    /// Fixed number of endpoints this pool manages.
    pub fn capacity(&self) -> usize {
        self.members.len()
    }

    /// Number of endpoints currently free.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Remove and return the next free endpoint, if any.
    pub fn take(&mut self) -> Option<Arc<UpstreamEndpoint>> {
        self.free.pop_front()
    }

    /// Whether `endpoint` is currently free.
    pub fn contains(&self, endpoint: &UpstreamEndpoint) -> bool {
        self.free.iter().any(|e| e.slot() == endpoint.slot())
    }

    /// Return an endpoint to availability.
    ///
    /// Fails without touching the pool if the endpoint does not belong to it,
    /// is already free, or the pool is full.
    pub fn release(&mut self, endpoint: Arc<UpstreamEndpoint>) -> Result<(), ProxyError> {
        let owned = self
            .members
            .get(endpoint.slot())
            .is_some_and(|m| Arc::ptr_eq(m, &endpoint));
        if !owned {
            return Err(ProxyError::InvariantViolation(format!(
                "release of foreign upstream {}",
                endpoint
            )));
        }
        if self.contains(&endpoint) {
            return Err(ProxyError::InvariantViolation(format!(
                "double release of upstream {}",
                endpoint
            )));
        }
        if self.free.len() >= self.capacity() {
            return Err(ProxyError::InvariantViolation(format!(
                "release of {} beyond capacity {}",
                endpoint,
                self.capacity()
            )));
        }
        self.free.push_back(endpoint);
        Ok(())
    }
}
