//! Sticky-session reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                 STICKY PROXY                     │
//!                        │                                                  │
//!     Client Request     │  ┌─────────┐    ┌──────────┐    ┌─────────────┐ │
//!     ───────────────────┼─▶│  http   │───▶│ routing  │───▶│load_balancer│ │
//!                        │  │ server  │    │(Host hdr)│    │ pool+cache  │ │
//!                        │  └─────────┘    └──────────┘    └──────┬──────┘ │
//!                        │                                        │        │
//!     Client Response    │  ┌──────────┐   ┌───────────┐          ▼        │
//!     ◀──────────────────┼──│ response │◀──│ forwarder │◀──── leased ──────┼──── Upstream
//!                        │  │ + cookie │   │ (client)  │      upstream     │
//!                        │  └──────────┘   └───────────┘                   │
//!                        │                                                  │
//!                        │  eviction schedulers · admin API · metrics       │
//!                        └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use sticky_proxy::admin::{setup_admin_router, AdminState};
use sticky_proxy::config::loader;
use sticky_proxy::lifecycle::{signals, Shutdown};
use sticky_proxy::observability::{logging, metrics};
use sticky_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "sticky-proxy")]
#[command(about = "Reverse proxy pinning each client session to one upstream", long_about = None)]
struct Args {
    /// Services file (JSON): virtual host → upstreams.
    #[arg(long, default_value = "conf.json")]
    conf: PathBuf,

    /// Optional settings file (TOML).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override the listen address from the settings file.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut settings = loader::load_settings(args.settings.as_deref())?;
    if let Some(listen) = args.listen {
        settings.listener.bind_address = listen;
    }

    logging::init(&settings.observability.log_level);
    tracing::info!("sticky-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let services = match loader::load_services(&args.conf) {
        Ok(services) => services,
        Err(e) => {
            tracing::error!(path = %args.conf.display(), error = %e, "Failed to load services");
            return Err(e.into());
        }
    };

    tracing::info!(
        bind_address = %settings.listener.bind_address,
        services = services.len(),
        sweep_interval_secs = settings.sessions.sweep_interval_secs,
        idle_ttl_secs = settings.sessions.idle_ttl_secs,
        active_ttl_secs = settings.sessions.active_ttl_secs,
        "Configuration loaded"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&settings.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(settings.clone(), &services);

    if settings.admin.enabled {
        let admin_listener = TcpListener::bind(&settings.admin.bind_address).await?;
        let state = AdminState::new(server.state().router.clone(), settings.admin.api_key.as_str());
        let app = setup_admin_router(state);
        let mut signal = shutdown.subscribe();
        tracing::info!(address = %settings.admin.bind_address, "Admin API listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(admin_listener, app)
                .with_graceful_shutdown(async move { signal.recv().await })
                .await
            {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
