//! # devconnect-server
//!
//! HTTP and WebSocket server for DevConnect.
//!
//! This binary provides:
//! - **Relationship engine**: connection requests, accept/reject/remove, bulk
//!   requests and an export snapshot
//! - **Recommendations**: ranked suggestions, search and network analytics
//! - **Direct messaging** between connected users, with conversations
//!   derived from the message log
//! - **Presence and notifications** pushed to live WebSocket connections

mod analytics;
mod api;
mod auth;
mod config;
mod conversations;
mod error;
mod presence;
mod profiles;
mod recommendations;
mod relationships;
mod ws;

#[cfg(test)]
mod test_support;

use tracing::info;
use tracing_subscriber::EnvFilter;

use devconnect_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,devconnect_server=debug")),
        )
        .init();

    info!("Starting DevConnect server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the database (runs migrations)
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, config);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
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
