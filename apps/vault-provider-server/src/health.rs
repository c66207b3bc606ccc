use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const HEALTH_PATH: &str = "/health";

#[must_use]
pub fn router() -> Router {
    Router::new().route(HEALTH_PATH, get(|| async { StatusCode::OK }))
}

/// Binds the health listener on all interfaces.
///
/// # Errors
/// Returns an error when the port cannot be bound.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind health listener on {addr}"))
}

/// Serves `/health` until `cancel` fires.
///
/// # Errors
/// Returns an error when the server stops for any reason other than cancellation.
pub async fn serve(listener: TcpListener, cancel: CancellationToken) -> Result<()> {
    let addr = listener.local_addr().context("health listener has no address")?;
    info!(address = %addr, path = HEALTH_PATH, "health server listening");
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("health server error")
}
