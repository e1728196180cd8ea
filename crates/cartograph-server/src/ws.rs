//! `WebSocket` handler for map clients.
//!
//! Clients connect to `GET /ws`. The handler first rebuilds the client's
//! render surface (every [`RenderCommand`] needed to redraw the current
//! features and layers, followed by a workspace snapshot), then streams a
//! JSON-encoded [`ServerMessage`] for each render command, store change,
//! and notice.
//!
//! Text frames from the client are parsed as [`SurfaceEvent`]s and
//! forwarded to the workspace. Their results arrive on the same stream.
//!
//! If a client falls behind on the render stream its surface is rebuilt
//! from scratch; lagged changes and notices are skipped.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use cartograph_core::{Command, CommandReply, WorkspaceSnapshot};
use cartograph_types::{Notice, RenderCommand, StoreChange, SurfaceEvent};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// One outbound frame.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    /// Current workspace state, sent after the surface replay.
    Snapshot(&'a WorkspaceSnapshot),
    /// An instruction for the client's render surface.
    Render(&'a RenderCommand),
    /// A feature store change.
    Change(&'a StoreChange),
    /// A user notice.
    Notice(&'a Notice),
}

/// Upgrade an HTTP request to a `WebSocket` connection.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_workspace(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Handle the `WebSocket` lifecycle.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    // Subscribe before the replay so nothing falls between the two.
    let mut render = state.render.subscribe();
    let mut changes = state.changes.subscribe();
    let mut notices = state.notices.subscribe();

    if !sync_client(&mut socket, &state).await {
        return;
    }

    loop {
        let outbound = tokio::select! {
            result = render.recv() => match result {
                Ok(command) => encode(&ServerMessage::Render(&command)),
                Err(RecvError::Lagged(n)) => {
                    debug!(skipped = n, "WebSocket client lagged on render stream, resyncing");
                    if !sync_client(&mut socket, &state).await {
                        return;
                    }
                    continue;
                }
                Err(RecvError::Closed) => {
                    debug!("Render channel closed, shutting down WebSocket");
                    return;
                }
            },
            result = changes.recv() => match result {
                Ok(change) => encode(&ServerMessage::Change(&change)),
                Err(RecvError::Lagged(n)) => {
                    debug!(skipped = n, "WebSocket client lagged on change stream");
                    continue;
                }
                Err(RecvError::Closed) => return,
            },
            result = notices.recv() => match result {
                Ok(notice) => encode(&ServerMessage::Notice(&notice)),
                Err(RecvError::Lagged(n)) => {
                    debug!(skipped = n, "WebSocket client lagged on notice stream");
                    continue;
                }
                Err(RecvError::Closed) => return,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | None => {
                    debug!("WebSocket client disconnected");
                    return;
                }
                Some(Ok(Message::Ping(data))) => Some(Message::Pong(data)),
                Some(Ok(Message::Text(text))) => {
                    if !forward_event(&state, text.as_str()).await {
                        return;
                    }
                    continue;
                }
                Some(Err(e)) => {
                    debug!("WebSocket error: {e}");
                    return;
                }
                // Binary and pong frames carry nothing for us.
                Some(Ok(_)) => continue,
            },
        };

        let Some(message) = outbound else {
            continue;
        };
        if socket.send(message).await.is_err() {
            debug!("WebSocket client disconnected (send failed)");
            return;
        }
    }
}

/// Send the replay and the snapshot. Returns false when the connection
/// should close.
async fn sync_client(socket: &mut WebSocket, state: &AppState) -> bool {
    let commands = match state.send(Command::Replay).await {
        Ok(CommandReply::Replay(commands)) => commands,
        Ok(other) => {
            warn!(reply = ?other, "Unexpected reply to replay");
            return false;
        }
        Err(e) => {
            warn!(error = %e, "Failed to replay render surface");
            return false;
        }
    };
    let snapshot = match state.send(Command::Snapshot).await {
        Ok(CommandReply::Snapshot(snapshot)) => snapshot,
        Ok(other) => {
            warn!(reply = ?other, "Unexpected reply to snapshot");
            return false;
        }
        Err(e) => {
            warn!(error = %e, "Failed to read workspace snapshot");
            return false;
        }
    };

    let frames = commands
        .iter()
        .map(ServerMessage::Render)
        .chain(std::iter::once(ServerMessage::Snapshot(&snapshot)));
    for frame in frames {
        let Some(message) = encode(&frame) else {
            continue;
        };
        if socket.send(message).await.is_err() {
            debug!("WebSocket client disconnected during replay");
            return false;
        }
    }
    debug!(commands = commands.len(), "Render surface replayed to client");
    true
}

/// Forward a client text frame as a surface event. Returns false when the
/// workspace is gone.
async fn forward_event(state: &AppState, text: &str) -> bool {
    let event: SurfaceEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "Ignoring unreadable client frame");
            return true;
        }
    };
    match state.fire(Command::Surface(event)).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Dropping surface event");
            false
        }
    }
}

fn encode(message: &ServerMessage<'_>) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Failed to serialize WebSocket message: {e}");
            None
        }
    }
}
