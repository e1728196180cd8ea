//! Axum router construction.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`] with
//! CORS middleware enabled for cross-origin map clients.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /ws` -- surface replay, then render, change, and notice stream
/// - `GET /api/workspace` -- current workspace snapshot
/// - `GET /api/features` -- features in insertion order
/// - `PATCH /api/features/{id}` -- rename a feature
/// - `DELETE /api/features/{id}` -- delete a feature
/// - `POST /api/features/{id}/focus` -- fit the viewport to a feature
/// - `POST /api/markers` -- add a marker
/// - `POST /api/path/points` -- append a path point
/// - `DELETE /api/path/points/{index}` -- remove a path point
/// - `POST /api/surface/events` -- submit a render surface edit event
/// - `GET /api/layers` -- uploaded layers
/// - `POST /api/layers/upload` -- upload dataset files
/// - `PUT /api/layers/{id}/visibility` -- show or hide a layer
/// - `GET /api/auth/session` -- the signed-in user
/// - `POST /api/auth/sign-in`, `POST /api/auth/sign-out`
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_workspace))
        // Features
        .route("/api/workspace", get(handlers::get_workspace))
        .route("/api/features", get(handlers::list_features))
        .route(
            "/api/features/{id}",
            patch(handlers::rename_feature).delete(handlers::delete_feature),
        )
        .route("/api/features/{id}/focus", post(handlers::focus_feature))
        .route("/api/markers", post(handlers::add_marker))
        .route("/api/path/points", post(handlers::add_path_point))
        .route(
            "/api/path/points/{index}",
            axum::routing::delete(handlers::remove_path_point),
        )
        .route("/api/surface/events", post(handlers::surface_event))
        // Layers
        .route("/api/layers", get(handlers::list_layers))
        .route("/api/layers/upload", post(handlers::upload_layers))
        .route("/api/layers/{id}/visibility", put(handlers::set_layer_visibility))
        // Identity
        .route("/api/auth/session", get(handlers::get_session))
        .route("/api/auth/sign-in", post(handlers::sign_in))
        .route("/api/auth/sign-out", post(handlers::sign_out))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
