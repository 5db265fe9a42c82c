//! Session-affinity load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Virtual host resolved
//!     → service.rs (one lock over pool + cache)
//!         - no cookie:   wait for a free upstream (pool.rs), create a lease (session.rs)
//!         - cookie:      look the lease up, reuse its upstream
//!         - close:       remove the lease, return its upstream
//!     → ActiveLease guard while the request is in flight
//!
//! eviction.rs (every few seconds, per host):
//!     classify leases → remove expired → return upstreams to the pool
//! ```
//!
//! # Design Decisions
//! - Selection is pool order (FIFO); no weights, no least-connections
//! - An upstream serves one session at a time
//! - Waiting for capacity is bounded by a configurable timeout

pub mod backend;
pub mod eviction;
pub mod pool;
pub mod service;
pub mod session;

pub use backend::UpstreamEndpoint;
pub use eviction::{EvictionScheduler, Expiry, ExpiryPolicy};
pub use pool::UpstreamPool;
pub use service::{ActiveLease, ServiceHandler, ServiceSnapshot, SessionSnapshot, SweepReport};
pub use session::{Lease, SessionCache, SessionId};
