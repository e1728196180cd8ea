//! REST API handlers.
//!
//! Every handler turns its request into a workspace [`Command`], sends it
//! down the command queue, and returns the [`CommandReply`] as JSON:
//!
//! ```json
//! { "result": "feature", "data": { "id": "...", "name": "Area 1", ... } }
//! ```
//!
//! Failures are reported through [`ApiError`]. A user notice describing
//! the failure is also published on the `WebSocket` stream.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/workspace` | Workspace snapshot |
//! | `GET` | `/api/features` | Features in insertion order |
//! | `PATCH` | `/api/features/{id}` | Rename a feature |
//! | `DELETE` | `/api/features/{id}` | Delete a feature |
//! | `POST` | `/api/features/{id}/focus` | Fit the viewport to a feature |
//! | `POST` | `/api/markers` | Add a marker |
//! | `POST` | `/api/path/points` | Append a path point |
//! | `DELETE` | `/api/path/points/{index}` | Remove a path point |
//! | `POST` | `/api/surface/events` | Submit a surface edit event |
//! | `GET` | `/api/layers` | Uploaded layers |
//! | `POST` | `/api/layers/upload` | Upload dataset files |
//! | `PUT` | `/api/layers/{id}/visibility` | Show or hide a layer |
//! | `GET` | `/api/auth/session` | The signed-in user |
//! | `POST` | `/api/auth/sign-in` | Sign a user in |
//! | `POST` | `/api/auth/sign-out` | Sign the user out |

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use cartograph_core::layers::UploadFile;
use cartograph_core::{Command, CommandReply, WorkspaceSnapshot};
use cartograph_types::{Coordinate, FeatureId, LayerId, SurfaceEvent, UserId};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `PATCH /api/features/{id}`.
#[derive(Debug, serde::Deserialize)]
pub struct RenameRequest {
    /// The new label.
    pub name: String,
}

/// Request body for `POST /api/markers`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct AddMarkerRequest {
    /// Where to place the marker. The map center when absent.
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

/// Request body for `POST /api/path/points`.
#[derive(Debug, serde::Deserialize)]
pub struct AddPathPointRequest {
    /// The new point.
    pub coordinate: Coordinate,
}

/// Request body for `POST /api/layers/upload`.
#[derive(Debug, serde::Deserialize)]
pub struct UploadRequest {
    /// The files of the batch.
    pub files: Vec<UploadFile>,
}

/// Request body for `PUT /api/layers/{id}/visibility`.
#[derive(Debug, serde::Deserialize)]
pub struct VisibilityRequest {
    /// Whether to show the layer.
    pub visible: bool,
}

/// Request body for `POST /api/auth/sign-in`.
#[derive(Debug, serde::Deserialize)]
pub struct SignInRequest {
    /// The user to sign in.
    pub user_id: UserId,
}

/// Response body of the `/api/auth` endpoints.
#[derive(Debug, serde::Serialize)]
struct SessionResponse {
    /// The signed-in user after the call.
    user: Option<UserId>,
    /// Whether the call changed the signed-in user.
    changed: bool,
}

async fn snapshot(state: &AppState) -> Result<WorkspaceSnapshot, ApiError> {
    match state.send(Command::Snapshot).await? {
        CommandReply::Snapshot(snapshot) => Ok(snapshot),
        other => Err(ApiError::Internal(format!(
            "unexpected reply to snapshot: {other:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Return the workspace snapshot.
pub async fn get_workspace(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(snapshot(&state).await?))
}

/// List features in insertion order.
pub async fn list_features(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(snapshot(&state).await?.features))
}

/// List uploaded layers in upload order.
pub async fn list_layers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(snapshot(&state).await?.layers))
}

// ---------------------------------------------------------------------------
// Feature edits
// ---------------------------------------------------------------------------

/// Submit an edit event from the render surface.
pub async fn surface_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<SurfaceEvent>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.send(Command::Surface(event)).await?))
}

/// Change a feature's label.
pub async fn rename_feature(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RenameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = Command::Rename {
        id: FeatureId::from(id),
        name: body.name,
    };
    Ok(Json(state.send(command).await?))
}

/// Delete a feature. Deleting an unknown id is not an error.
pub async fn delete_feature(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let command = Command::Delete {
        id: FeatureId::from(id),
    };
    Ok(Json(state.send(command).await?))
}

/// Fit the viewport to a feature.
pub async fn focus_feature(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let command = Command::Focus {
        id: FeatureId::from(id),
    };
    Ok(Json(state.send(command).await?))
}

/// Add a marker. An empty body places it at the map center.
pub async fn add_marker(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: AddMarkerRequest = if body.is_empty() {
        AddMarkerRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::BadRequest(format!("invalid marker body: {err}")))?
    };
    let command = Command::AddMarker {
        coordinate: body.coordinate,
    };
    Ok(Json(state.send(command).await?))
}

/// Append a point to the path.
pub async fn add_path_point(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddPathPointRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = Command::AddPathPoint {
        coordinate: body.coordinate,
    };
    Ok(Json(state.send(command).await?))
}

/// Remove a point from the path.
pub async fn remove_path_point(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.send(Command::RemovePathPoint { index }).await?))
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// Upload a batch of dataset files. Each file is reported separately; a
/// rejected file does not fail the request.
pub async fn upload_layers(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UploadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.files.is_empty() {
        return Err(ApiError::BadRequest(String::from("no files in upload")));
    }
    Ok(Json(state.send(Command::Upload { files: body.files }).await?))
}

/// Show or hide a layer.
pub async fn set_layer_visibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<VisibilityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = Command::SetLayerVisibility {
        layer_id: LayerId::from(id),
        visible: body.visible,
    };
    Ok(Json(state.send(command).await?))
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Return the signed-in user.
pub async fn get_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(SessionResponse {
        user: state.identity.current(),
        changed: false,
    })
}

/// Sign a user in. The workspace clears itself and loads their features.
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.user_id.as_str().trim().is_empty() {
        return Err(ApiError::BadRequest(String::from("user_id must not be blank")));
    }
    let changed = state.identity.sign_in(body.user_id);
    Ok(Json(SessionResponse {
        user: state.identity.current(),
        changed,
    }))
}

/// Sign the current user out. The workspace is cleared.
pub async fn sign_out(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let changed = state.identity.sign_out();
    Json(SessionResponse {
        user: state.identity.current(),
        changed,
    })
}
