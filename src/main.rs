//! Photo Cache - thumbnail proxy server
//!
//! Serves remote images through the two-level cache over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photo_cache::api::{create_router, AppState};
use photo_cache::config::Config;
use photo_cache::facade::PhotoCache;
use photo_cache::fetch::{HttpTransport, ImageDecoder};
use photo_cache::tasks::spawn_flush_task;

/// Main entry point for the photo cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the cache (disk tier, memory tier, fetch coordinator)
/// 4. Start background journal flush task
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. On SIGINT/SIGTERM, cancel fetches and flush before exiting
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Photo Cache Server");

    // Load configuration from environment variables
    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_dir={}, disk_capacity={}B, memory_capacity={}B, workers={}, port={}",
        config.cache_dir.display(),
        config.disk_capacity_bytes,
        config.memory_capacity_bytes(),
        config.max_concurrent_fetches,
        config.server_port
    );

    let transport = HttpTransport::new(Duration::from_secs(config.fetch_timeout))
        .context("failed to build HTTP client")?;
    let cache = PhotoCache::open(&config, Arc::new(transport), ImageDecoder)
        .context("failed to open photo cache")?;
    let state = AppState::new(cache, Duration::from_secs(config.delivery_timeout));
    info!("Photo cache initialized");

    // Start background flush task
    let flush_handle = spawn_flush_task(state.cache.clone(), config.flush_interval);
    info!("Background flush task started");

    let cache = state.cache.clone();

    // Create router with all endpoints
    let app = create_router(state);

    // Bind to configured port
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(flush_handle))
        .await
        .context("server error")?;

    // Teardown: no further deliveries, then a final durability checkpoint
    let cancelled = cache.cancel_all();
    info!(cancelled, "In-flight fetches cancelled");
    let flushed = tokio::task::spawn_blocking(move || cache.flush()).await?;
    if let Err(e) = flushed {
        warn!(error = %e, "Final flush failed");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the flush task and allows graceful shutdown.
async fn shutdown_signal(flush_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Abort the flush task
    flush_handle.abort();
    warn!("Flush task aborted");
}
