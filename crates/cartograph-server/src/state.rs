//! Shared application state for the API server.
//!
//! [`AppState`] holds the sending half of the workspace command queue, the
//! identity provider, and the broadcast senders the `WebSocket` handler
//! subscribes to. It is wrapped in an [`Arc`](std::sync::Arc) and shared
//! across all Axum handlers via [`State`](axum::extract::State).

use std::sync::Arc;

use cartograph_core::{Command, CommandReply, IdentityProvider, Request};
use cartograph_types::{Notice, RenderCommand, StoreChange};
use tokio::sync::{broadcast, mpsc};

use crate::error::ApiError;

/// Shared state accessible by all Axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Inbound command queue of the workspace task.
    pub commands: mpsc::Sender<Request>,
    /// Who is signed in.
    pub identity: Arc<IdentityProvider>,
    /// Render surface instructions.
    pub render: broadcast::Sender<RenderCommand>,
    /// Feature store changes.
    pub changes: broadcast::Sender<StoreChange>,
    /// User notices.
    pub notices: broadcast::Sender<Notice>,
}

impl AppState {
    /// Send a command to the workspace and wait for its reply.
    ///
    /// Commands issued while the initial load is outstanding are answered
    /// once it completes.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unavailable`] if the workspace task has stopped
    /// or dropped the request (a queued command is dropped when its session
    /// ends), and [`ApiError::Workspace`] if the command failed.
    pub async fn send(&self, command: Command) -> Result<CommandReply, ApiError> {
        let (request, reply) = Request::new(command);
        self.commands
            .send(request)
            .await
            .map_err(|err| ApiError::Unavailable(format!("command queue closed: {err}")))?;
        let result = reply
            .await
            .map_err(|err| ApiError::Unavailable(format!("request dropped: {err}")))?;
        Ok(result?)
    }

    /// Queue a command without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unavailable`] if the workspace task has stopped.
    pub async fn fire(&self, command: Command) -> Result<(), ApiError> {
        self.commands
            .send(Request::fire(command))
            .await
            .map_err(|err| ApiError::Unavailable(format!("command queue closed: {err}")))
    }
}
