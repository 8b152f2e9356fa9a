// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::clock::SystemClock;
use crate::application::coordinator::RangeCoordinator;
use crate::application::publisher::Publisher;
use crate::application::state_store::LocalCache;
use crate::infrastructure::config::load_config;
use crate::infrastructure::file_cache::FileLocalCache;
use crate::infrastructure::memory_store::{InMemoryGlobalState, InMemoryLocalCache};
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    apply_link, get_range, health_check, options, refresh, select_custom, select_quick,
    set_granularity, set_sync, set_timezone, share_link, stream_windows,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_config()?;

    // Persistence tiers (infrastructure layer)
    let global = Arc::new(InMemoryGlobalState::new());
    let local: Arc<dyn LocalCache> = if config.storage.local_cache_path.as_os_str().is_empty() {
        tracing::info!("No local cache path configured, selections will not survive restarts");
        Arc::new(InMemoryLocalCache::new())
    } else {
        Arc::new(FileLocalCache::open(&config.storage.local_cache_path))
    };

    // Coordinator (application layer)
    let publisher = Arc::new(Publisher::new(
        config.picker.subscriber_capacity,
        global,
        local.clone(),
    ));
    let coordinator = RangeCoordinator::load(&config.picker, publisher, Arc::new(SystemClock))
        .context("Failed to restore range selection")?;

    let state = Arc::new(AppState { coordinator });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/range", get(get_range))
        .route("/range/options", get(options))
        .route("/range/quick", post(select_quick))
        .route("/range/custom", post(select_custom))
        .route("/range/granularity", put(set_granularity))
        .route("/range/sync", put(set_sync))
        .route("/range/timezone", put(set_timezone))
        .route("/range/refresh", post(refresh))
        .route("/range/link", get(share_link).post(apply_link))
        .route("/range/stream", get(stream_windows))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid server.bind address '{}'", config.server.bind))?;
    tracing::info!("Starting range-coordinator service on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.coordinator.shutdown();
    if let Err(e) = local.flush() {
        tracing::warn!("Failed to flush local cache: {:#}", e);
    }
    tracing::info!("Range coordinator stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}
