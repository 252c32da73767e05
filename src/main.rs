//! Cache Manager - keeps a liveness record in the shared cache and drains
//! the cache's data queue into Postgres in bulk batches.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_manager::api::{create_router, AppState};
use cache_manager::{CacheManager, Config};

/// Main entry point for the cache manager.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build the cache gateway, sink and error reporter
/// 4. Connect the cache and start the heartbeat and drain timers
/// 5. Serve the status endpoints if a status port is configured
/// 6. Shut down gracefully on SIGINT/SIGTERM
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_manager=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;
    info!(
        "Configuration loaded: env={}, cache={}:{}, drain_interval={}ms, max_batch_size={}",
        config.runtime_env,
        config.redis_host,
        config.redis_port,
        config.drain_interval_ms,
        config.max_batch_size
    );

    let mut manager = CacheManager::from_config(config)?;
    manager.initialize().await;

    let status_server = match manager.config().status_port {
        Some(port) => {
            let state = AppState::new(manager.gateway().clone(), manager.stats());
            let app = create_router(state);

            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind status server to {}", addr))?;
            info!("Status server listening on http://{}", addr);

            Some(tokio::spawn(async move {
                if let Err(err) = axum::serve(listener, app).await {
                    warn!(error = %err, "Status server stopped");
                }
            }))
        }
        None => None,
    };

    shutdown_signal().await;

    manager.shutdown().await;
    if let Some(server) = status_server {
        server.abort();
    }

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
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
}
