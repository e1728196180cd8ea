//! Cartograph server binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `cartograph.yaml` (or `CARTOGRAPH_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations, or fall back to the
//!    in-memory feature store when the database is disabled
//! 4. Spawn the workspace task
//! 5. Serve the HTTP + `WebSocket` API until `Ctrl-C`

use std::path::PathBuf;
use std::sync::Arc;

use cartograph_core::config::LogFormat;
use cartograph_core::{CartographConfig, MemoryRemote};
use cartograph_db::{FeatureDatabase, PoolSettings};
use cartograph_server::startup::{StartupError, spawn_server, spawn_workspace};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, database setup, or server startup
/// fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config);
    info!("cartograph-server starting");
    match source {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        kind = ?config.workspace.kind,
        database = config.database.enabled,
        "Workspace configured"
    );

    // 3 + 4. Pick the remote store and spawn the workspace.
    let mut database = None;
    let (state, workspace) = if config.database.enabled {
        let opened = FeatureDatabase::open(&PoolSettings::from(&config.database)).await?;
        let store = opened.features();
        database = Some(opened);
        spawn_workspace(&config, Arc::new(store))
    } else {
        info!("Database disabled, using in-memory feature store");
        spawn_workspace(&config, Arc::new(MemoryRemote::new()))
    };

    // 5. Serve.
    let mut server = spawn_server(&config.server, state)?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown requested");
        }
        result = &mut server => {
            if let Err(e) = result {
                warn!(error = %e, "Server task ended abnormally");
            }
        }
    }

    server.abort();
    workspace.abort();
    if let Some(database) = database {
        database.close().await;
    }
    info!("cartograph-server stopped");
    Ok(())
}

/// Load `cartograph.yaml`, or the file named by `CARTOGRAPH_CONFIG`.
///
/// Returns the path the configuration came from, or `None` when defaults
/// (plus environment overrides) are used.
fn load_config() -> Result<(CartographConfig, Option<PathBuf>), StartupError> {
    let path = std::env::var_os("CARTOGRAPH_CONFIG")
        .map_or_else(|| PathBuf::from("cartograph.yaml"), PathBuf::from);
    if path.exists() {
        let config = CartographConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        let mut config = CartographConfig::default();
        config.apply_env_overrides();
        Ok((config, None))
    }
}

fn init_logging(config: &CartographConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}
