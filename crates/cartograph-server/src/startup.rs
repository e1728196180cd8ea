//! Wiring of the workspace task and the HTTP server.
//!
//! [`spawn_workspace`] builds a [`Workspace`] over a remote store and a
//! [`CommandSurface`], starts its run loop on a background Tokio task, and
//! returns the [`AppState`] the router serves. [`spawn_server`] then runs
//! the HTTP server on another task.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cartograph_core::{CartographConfig, MemoryRemote};
//! use cartograph_server::startup::{spawn_server, spawn_workspace};
//!
//! let config = CartographConfig::default();
//! let (state, workspace) = spawn_workspace(&config, Arc::new(MemoryRemote::new()));
//! let server = spawn_server(&config.server, state)?;
//! ```

use std::sync::Arc;

use cartograph_core::config::{ConfigError, ServerSection};
use cartograph_core::{
    CartographConfig, CommandSurface, IdentityProvider, RemoteFeatureStore, Workspace,
};
use cartograph_db::DbError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur while starting the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The configuration file could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The database could not be reached or migrated.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Start a workspace over `remote` on a background task.
///
/// The task runs until every [`AppState`] clone (and with it the command
/// queue sender) is dropped.
pub fn spawn_workspace<R: RemoteFeatureStore>(
    config: &CartographConfig,
    remote: Arc<R>,
) -> (Arc<AppState>, JoinHandle<()>) {
    let capacity = config.workspace.channel_capacity.max(1);
    let (render, _) = broadcast::channel(capacity);
    let surface = CommandSurface::with_sender(render.clone());
    let workspace = Workspace::new(config, remote, surface);

    let identity = Arc::new(IdentityProvider::new());
    let (commands, rx) = mpsc::channel(config.workspace.command_capacity.max(1));

    let state = Arc::new(AppState {
        commands,
        identity: Arc::clone(&identity),
        render,
        changes: workspace.change_sender(),
        notices: workspace.notice_sender(),
    });

    let handle = tokio::spawn(workspace.run(rx, identity.subscribe()));
    tracing::info!(kind = ?config.workspace.kind, "Workspace spawned on background task");

    (state, handle)
}

/// Spawn the HTTP server on a background Tokio task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured address does not
/// parse. Bind failures are logged by the task.
pub fn spawn_server(
    settings: &ServerSection,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, StartupError> {
    let config = ServerConfig::from(settings);

    let addr_str = format!("{}:{}", config.host, config.port);
    let _: std::net::SocketAddr = addr_str.parse().map_err(|e| {
        StartupError::Server(ServerError::Bind(format!("invalid address {addr_str}: {e}")))
    })?;

    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::start_server(&config, state).await {
            tracing::error!(error = %e, "Server exited with error");
        }
    });

    tracing::info!(port = settings.port, "Server spawned on background task");

    Ok(handle)
}
