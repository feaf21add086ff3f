//! Accessibility Scanner API Server

use a11y_api::{build_router, build_state, config::AppConfig};
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "a11y_api=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Accessibility Scanner API Server");

    let config = AppConfig::from_env();
    let addr = config.bind_addr.clone();
    info!(environment = %config.environment, store = config.store_kind(), "Configuration loaded");

    let state = build_state(config).await.context("Failed to initialize application")?;

    let reaped = state
        .store
        .reap_interrupted()
        .await
        .context("Failed to recover interrupted scans")?;
    if reaped > 0 {
        warn!(count = reaped, "Marked interrupted scans as failed");
    }

    let store = state.store.clone();
    let app = build_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
