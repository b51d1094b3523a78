//! Axum liveness endpoint for hosts that probe an HTTP port.
//!
//! Only `GET /` is served. Body limits and timeouts still apply so a
//! misbehaving prober cannot hold connections open.

use anyhow::Result;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (1KB); the endpoint takes no input.
pub const MAX_BODY_SIZE: usize = 1024;
/// Request timeout (10s).
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

pub const ALIVE_BODY: &str = "I'm alive";

pub fn router() -> Router {
    Router::new()
        .route("/", get(handle_alive))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Bind `host:port` and serve the liveness endpoint until the process exits.
pub async fn run_health_server(host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Health endpoint listening on http://{host}:{actual_port}/");

    axum::serve(listener, router()).await?;
    Ok(())
}

/// GET /: plain-text liveness probe.
async fn handle_alive() -> impl IntoResponse {
    (StatusCode::OK, ALIVE_BODY)
}
