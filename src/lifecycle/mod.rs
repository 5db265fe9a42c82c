//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → HTTP server stops accepting and drains
//!             → eviction schedulers leave their loops
//!             → admin API stops
//! ```
//!
//! # Design Decisions
//! - Session state is abandoned on exit; nothing is persisted
//! - A trigger that fires before a task subscribes is still observed

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
