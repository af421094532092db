//! HTTP server for the persona agent API.
//!
//! Provides REST endpoints for:
//! - Conversational turns
//! - Opening lines
//! - Memory resets

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Router with CORS and request tracing applied.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve until the process is stopped.
///
/// # Errors
/// Returns an error if the listener cannot bind or serving fails.
pub async fn run_server(state: Arc<AppState>, port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    run_server_with_shutdown(state, port, std::future::pending()).await
}

/// Serve until `shutdown_signal` completes, then drain open connections.
///
/// # Errors
/// Returns an error if the listener cannot bind or serving fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "persona agent listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal)
        .await?;
    tracing::info!("server stopped");
    Ok(())
}
