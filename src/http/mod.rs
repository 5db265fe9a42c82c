//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, virtual host lookup)
//!     → request.rs (session cookies)
//!     → forwarder.rs (lease, relay to upstream)
//!     → response.rs (session cookie, header filtering, failures)
//!     → Send to client
//! ```

pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;

pub use forwarder::RequestForwarder;
pub use request::{SessionCookies, CLOSE_COOKIE, SESSION_COOKIE, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
