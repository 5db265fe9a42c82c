use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tokio::time::Instant;

use crate::admin::AdminState;
use crate::error::ProxyError;
use crate::load_balancer::{ServiceSnapshot, SessionSnapshot};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub services: usize,
    pub sessions: usize,
}

#[derive(Serialize)]
pub struct ServiceSummary {
    pub host: String,
    pub capacity: usize,
    pub available: usize,
    pub sessions: usize,
    pub active_sessions: usize,
}

impl From<&ServiceSnapshot> for ServiceSummary {
    fn from(snapshot: &ServiceSnapshot) -> Self {
        Self {
            host: snapshot.name.clone(),
            capacity: snapshot.capacity,
            available: snapshot.available,
            sessions: snapshot.sessions.len(),
            active_sessions: snapshot.sessions.iter().filter(|s| s.active).count(),
        }
    }
}

#[derive(Serialize)]
pub struct ClosedSession {
    pub id: String,
    pub upstream: String,
}

fn snapshots(state: &AdminState) -> Vec<ServiceSnapshot> {
    let now = Instant::now();
    state
        .router
        .services()
        .iter()
        .map(|service| service.snapshot(now))
        .collect()
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshots = snapshots(&state);
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        services: snapshots.len(),
        sessions: snapshots.iter().map(|s| s.sessions.len()).sum(),
    })
}

pub async fn get_services(State(state): State<AdminState>) -> Json<Vec<ServiceSummary>> {
    Json(snapshots(&state).iter().map(ServiceSummary::from).collect())
}

pub async fn get_sessions(
    State(state): State<AdminState>,
    Path(host): Path<String>,
) -> Result<Json<Vec<SessionSnapshot>>, StatusCode> {
    let service = state.router.get(&host).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(service.snapshot(Instant::now()).sessions))
}

/// Force-close a session, returning its upstream to the pool.
pub async fn close_session(
    State(state): State<AdminState>,
    Path((host, id)): Path<(String, String)>,
) -> Result<Json<ClosedSession>, StatusCode> {
    let service = state.router.get(&host).ok_or(StatusCode::NOT_FOUND)?;
    match service.close_session(&id) {
        Ok(lease) => {
            tracing::info!(service = %host, session = %id, "Session closed via admin API");
            Ok(Json(ClosedSession {
                id: lease.id.to_string(),
                upstream: lease.upstream.addr().to_string(),
            }))
        }
        Err(ProxyError::SessionNotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
