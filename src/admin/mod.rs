//! Read-mostly admin API over the live session state.
//!
//! Served on its own listener so it can stay bound to loopback while the
//! proxy listens publicly.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use std::sync::Arc;

use crate::routing::ServiceRouter;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub router: Arc<ServiceRouter>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(router: Arc<ServiceRouter>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            router,
            api_key: api_key.into(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/services", get(get_services))
        .route("/admin/services/{host}/sessions", get(get_sessions))
        .route("/admin/services/{host}/sessions/{id}", delete(close_session))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
