//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Resolve the virtual host and hand the request to the forwarder
//! - Run eviction schedulers for the server's lifetime
//! - Graceful shutdown

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{ProxySettings, ServiceMap};
use crate::http::forwarder::RequestForwarder;
use crate::http::request;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::{matcher, ServiceRouter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ServiceRouter>,
    pub forwarder: Arc<RequestForwarder>,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
    settings: ProxySettings,
}

impl HttpServer {
    /// Create a new HTTP server for the given services.
    pub fn new(settings: ProxySettings, services: &ServiceMap) -> Self {
        let state = AppState {
            router: Arc::new(ServiceRouter::from_config(services, &settings.sessions)),
            forwarder: Arc::new(RequestForwarder::new(&settings)),
        };
        let router = Self::build_router(state.clone());
        Self {
            router,
            state,
            settings,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(request::propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(request::set_request_id_layer())
    }

    /// Shared state, for the admin API.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the settings.
    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// Serve on `listener` until `shutdown` fires, then drain and stop the
    /// eviction schedulers.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = self.state.router.len(),
            "HTTP server starting"
        );

        let schedulers = self.state.router.spawn_eviction(&shutdown);

        let mut signal = shutdown.subscribe();
        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { signal.recv().await })
            .await;

        // Also stops the schedulers when serving failed on its own.
        shutdown.trigger();
        for scheduler in schedulers {
            if let Err(e) = scheduler.await {
                tracing::error!(error = %e, "Eviction scheduler panicked");
            }
        }

        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Resolves the virtual host, then lets the forwarder do the rest.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let host = matcher::request_host(&request).map(str::to_string);

    let service = match state.router.resolve(host.as_deref()) {
        Ok(service) => service,
        Err(e) => {
            tracing::warn!(
                request_id = %request::request_id(&request),
                host = host.as_deref().unwrap_or("-"),
                kind = e.kind(),
                "No virtual host matched"
            );
            metrics::record_request("none", e.kind(), start);
            return e.into_response();
        }
    };

    state.forwarder.forward(&service, request).await
}
