//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → matcher.rs (extract + normalise host)
//!     → router.rs (virtual host lookup)
//!     → Return: ServiceHandler or UnknownService
//! ```

pub mod matcher;
pub mod router;

pub use router::ServiceRouter;
