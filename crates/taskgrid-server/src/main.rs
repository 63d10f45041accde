//! # taskgrid-server
//!
//! Collaborative task list server.
//!
//! This binary provides:
//! - **REST API** (axum) for accounts, lists, tasks, sharing, notifications
//!   and the dashboard, with every read and write checked against the
//!   caller's effective permission
//! - **Real-time rooms** over WebSocket: clients join their user room and the
//!   rooms of lists they can see, and are told to refetch when something
//!   changes
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod auth;
mod config;
mod error;
mod rate_limit;
mod realtime;
mod rooms;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use taskgrid_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::realtime::RealtimeBridge;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,taskgrid_server=debug,taskgrid_store=info")
        }))
        .init();

    info!("Starting TaskGrid server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;

    let bridge = Arc::new(RealtimeBridge::new());
    bridge.init(config.ws_queue_capacity)?;

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, bridge, config);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Rate limiter cleanup (every 5 minutes, evict clients idle >10 min)
    let rl = app_state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_idle(Duration::from_secs(600)).await;
        }
    });

    // Expired session cleanup (hourly)
    let db = app_state.db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match db.lock().await.purge_expired_sessions() {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired sessions"),
                Err(e) => warn!(error = %e, "Session cleanup failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
