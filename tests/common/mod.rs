//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

use sticky_proxy::config::{ProxySettings, ServiceConfig, ServiceMap, UpstreamConfig};
use sticky_proxy::http::HttpServer;
use sticky_proxy::lifecycle::Shutdown;

/// Start an upstream answering every request with `name`.
///
/// - `/slow` sleeps before answering
/// - `/cookies` echoes the `Cookie` header it saw
/// - `/echo` answers `"<method> <path?query> <body>"`
/// - `/created` answers 201
/// - `/large` answers a 4 KiB body
pub async fn start_upstream(name: &'static str) -> SocketAddr {
    let app = Router::new().fallback(move |request: Request<Body>| async move {
        let method = request.method().clone();
        let target = request
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str())
            .to_string();
        let path = request.uri().path().to_string();
        let cookie = request
            .headers()
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap_or_default();

        match path.as_str() {
            "/slow" => {
                tokio::time::sleep(Duration::from_millis(300)).await;
                (StatusCode::OK, name.to_string())
            }
            "/cookies" => (StatusCode::OK, cookie),
            "/echo" => (
                StatusCode::OK,
                format!("{} {} {}", method, target, String::from_utf8_lossy(&body)),
            ),
            "/created" => (StatusCode::CREATED, name.to_string()),
            "/large" => (StatusCode::OK, "x".repeat(4096)),
            _ => (StatusCode::OK, name.to_string()),
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn services(host: &str, upstreams: &[SocketAddr]) -> ServiceMap {
    let mut map = ServiceMap::new();
    map.insert(
        host.to_string(),
        ServiceConfig {
            upstreams: upstreams
                .iter()
                .map(|addr| UpstreamConfig { addr: addr.to_string() })
                .collect(),
        },
    );
    map
}

/// Settings with short timeouts suited to tests.
pub fn test_settings() -> ProxySettings {
    let mut settings = ProxySettings::default();
    settings.timeouts.acquire_ms = 2_000;
    settings.timeouts.upstream_ms = 2_000;
    settings
}

/// Run the proxy on an ephemeral port.
pub async fn start_proxy(services: ServiceMap, settings: ProxySettings) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(settings, &services);
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

/// Send `GET path` to the proxy as virtual host `host` with optional cookies.
pub async fn get(
    client: &reqwest::Client,
    proxy: SocketAddr,
    host: &str,
    path: &str,
    cookie: Option<&str>,
) -> reqwest::Response {
    let mut request = client
        .get(format!("http://{}{}", proxy, path))
        .header("Host", host);
    if let Some(cookie) = cookie {
        request = request.header("Cookie", cookie);
    }
    request.send().await.expect("proxy unreachable")
}

/// Session identifier from the response's `Set-Cookie`, if any.
pub fn session_id(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("lbc_session_id="))
        .map(|rest| rest.split(';').next().unwrap_or("").to_string())
        .filter(|id| !id.is_empty())
}
