mod routes;
mod singleton;
mod state;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use weekplan_core::config::ServerConfig;
use weekplan_core::storage;

use crate::state::AppState;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServerConfig::load().context("Failed to load server configuration")?;

    // Ensure only one instance writes a local data directory
    let _lock = if config.storage.is_filesystem() {
        Some(singleton::acquire_lock(&config.storage.data_dir()?)?)
    } else {
        None
    };

    let storage = storage::from_config(&config.storage).context("Failed to open storage")?;
    let backend = storage.describe();
    let app = routes::app(AppState::new(storage));

    let addr = config.socket_addr()?;
    info!(%addr, %backend, "weekplan-server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
