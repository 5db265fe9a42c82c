//! Throwaway upstream for trying the proxy by hand.
//!
//! ```text
//! cargo run --example upstream -- A 127.0.0.1:3001
//! cargo run --example upstream -- B 127.0.0.1:3002
//! cargo run -- --conf demos/services.json --settings demos/settings.toml
//! curl -si -H 'Host: svc.local' http://127.0.0.1:8070/
//! ```

use axum::{body::Body, http::Request, Router};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let name = args.next().unwrap_or_else(|| "upstream".to_string());
    let addr: SocketAddr = args
        .next()
        .unwrap_or_else(|| "127.0.0.1:3001".to_string())
        .parse()?;

    let app = Router::new().fallback(move |request: Request<Body>| {
        let name = name.clone();
        async move { format!("{} {} {}\n", name, request.method(), request.uri()) }
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("upstream listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
