//! The HTTP service.
//!
//! `GET /` is a plain greeting and is never limited. `POST /` is admitted or
//! rejected per source address by the [`RateLimitLayer`].

use std::net::SocketAddr;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;

use crate::middleware::RateLimitLayer;
use crate::storage::Storage;

/// Body of `GET /`.
pub const GREETING: &str = "Hello World!";

/// Body of an admitted `POST /`.
pub const ACCEPTED: &str = "OK!";

async fn greet() -> &'static str {
    GREETING
}

async fn accept() -> &'static str {
    ACCEPTED
}

/// Build the application router with `layer` guarding `POST /`.
pub fn router<S: Storage>(layer: RateLimitLayer<S>) -> Router {
    Router::new().route("/", get(greet).merge(post(accept).layer(layer)))
}

/// Serve `app` on `listener` until Ctrl+C.
///
/// Peer addresses are recorded on every request so the limiter can key on them.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
