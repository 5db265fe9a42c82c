//! Upstream endpoint abstraction.
//!
//! # Responsibilities
//! - Represent one configured upstream slot of a virtual host
//! - Carry a slot identity so duplicate addresses stay distinct
//! - Build outbound URIs for the forwarder

use std::fmt;

/// One configured upstream of a virtual host. Immutable after load.
///
/// Two endpoints with the same address are still different slots; pool
/// bookkeeping compares `slot`, never `addr`.
#[derive(Debug, PartialEq, Eq)]
pub struct UpstreamEndpoint {
    slot: usize,
    addr: String,
}

impl UpstreamEndpoint {
    /// Create the endpoint occupying `slot` in its virtual host's pool.
    pub fn new(slot: usize, addr: impl Into<String>) -> Self {
        Self {
            slot,
            addr: addr.into(),
        }
    }

    /// Position of this endpoint in its host's configured upstream list.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The `host:port` this endpoint forwards to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Absolute URI on this upstream for a request path (with query).
    pub fn uri_for(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl fmt::Display for UpstreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.addr, self.slot)
    }
}
