//! Startup helpers for the persona agent server.

use std::process::ExitCode;
use std::sync::Arc;

use crate::agent::config::AgentConfig;
use crate::memory::maintenance::background_cleanup::BackgroundCleanup;
use crate::server::{self, AppState};

/// Run the server until Ctrl+C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting persona agent v{}", env!("CARGO_PKG_VERSION"));

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    tracing::info!(
        model = %config.llm.model,
        ollama = config.llm.base_url.as_deref().unwrap_or("default"),
        embeddings = config.memory.embedding.model.as_deref().unwrap_or("hashing"),
        "configuration loaded"
    );

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve(config)) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Build state, start the periodic cleanup and serve until Ctrl+C.
///
/// # Errors
/// Returns an error if state creation or the server fails.
pub async fn serve(config: AgentConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = initialize(&config).await?;

    let cleanup = BackgroundCleanup::new(state.agent.memory());
    let stop_cleanup = cleanup.shutdown_notifier();
    let cleanup_task = cleanup.spawn();

    let result = server::run_server_with_shutdown(state, config.port, shutdown_signal()).await;

    stop_cleanup.notify_one();
    if let Err(e) = cleanup_task.await {
        tracing::warn!("cleanup task ended abnormally: {e}");
    }
    result
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if state creation fails.
pub async fn initialize(
    config: &AgentConfig,
) -> Result<Arc<AppState>, Box<dyn std::error::Error + Send + Sync>> {
    AppState::from_config(config)
        .await
        .map_err(|e| format!("Failed to create state: {e}").into())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
