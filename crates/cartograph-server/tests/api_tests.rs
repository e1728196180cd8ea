//! Integration tests for the REST endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Each test spawns its own workspace over the
//! in-memory remote store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use cartograph_core::{CartographConfig, MemoryRemote};
use cartograph_server::router::build_router;
use cartograph_server::startup::spawn_workspace;
use cartograph_types::WorkspaceKind;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(kind: WorkspaceKind) -> Router {
    let mut config = CartographConfig::default();
    config.workspace.kind = kind;
    let (state, _workspace) = spawn_workspace(&config, Arc::new(MemoryRemote::new()));
    build_router(state)
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn square(id: &str) -> Value {
    json!({
        "event": "primitive_created",
        "id": id,
        "kind": "polygon",
        "coordinates": [[0.0, 0.0], [0.01, 0.0], [0.01, 0.01], [0.0, 0.01]],
    })
}

#[tokio::test]
async fn workspace_starts_empty() {
    let router = app(WorkspaceKind::AreaSet);
    let (status, json) = call(&router, "GET", "/api/workspace", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "area_set");
    assert_eq!(json["user"], Value::Null);
    assert_eq!(json["features"], json!([]));
    assert_eq!(json["layers"], json!([]));
}

#[tokio::test]
async fn drawn_polygon_becomes_a_measured_feature() {
    let router = app(WorkspaceKind::AreaSet);
    let (status, json) = call(&router, "POST", "/api/surface/events", Some(square("d1"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], "feature");
    assert_eq!(json["data"]["id"], "d1");
    assert_eq!(json["data"]["name"], "Untitled 1");
    assert_eq!(json["data"]["geometry"]["type"], "Polygon");
    assert_eq!(json["data"]["geometry"]["coordinates"].as_array().unwrap().len(), 5);
    assert_eq!(json["data"]["derived"]["kind"], "area");
    assert!(json["data"]["derived"]["square_meters"].as_f64().unwrap() > 0.0);

    let (_, features) = call(&router, "GET", "/api/features", None).await;
    assert_eq!(features.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn incomplete_polygon_is_rejected() {
    let router = app(WorkspaceKind::AreaSet);
    let event = json!({
        "event": "primitive_created",
        "id": "d1",
        "kind": "polygon",
        "coordinates": [[0.0, 0.0], [1.0, 1.0]],
    });
    let (status, json) = call(&router, "POST", "/api/surface/events", Some(event)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["status"], 422);

    let (_, features) = call(&router, "GET", "/api/features", None).await;
    assert_eq!(features, json!([]));
}

#[tokio::test]
async fn rename_and_delete_a_feature() {
    let router = app(WorkspaceKind::AreaSet);
    call(&router, "POST", "/api/surface/events", Some(square("d1"))).await;

    let (status, json) = call(&router, "PATCH", "/api/features/d1", Some(json!({ "name": "Home" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Home");

    let (status, json) = call(&router, "DELETE", "/api/features/d1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], "deleted");
    assert_eq!(json["data"]["name"], "Home");

    let (_, features) = call(&router, "GET", "/api/features", None).await;
    assert_eq!(features, json!([]));
}

#[tokio::test]
async fn renaming_an_unknown_feature_is_not_found() {
    let router = app(WorkspaceKind::AreaSet);
    let (status, json) = call(&router, "PATCH", "/api/features/ghost", Some(json!({ "name": "x" }))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn deleting_an_unknown_feature_is_ignored() {
    let router = app(WorkspaceKind::AreaSet);
    let (status, json) = call(&router, "DELETE", "/api/features/ghost", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], "ignored");
}

#[tokio::test]
async fn focus_returns_the_feature_bounds() {
    let router = app(WorkspaceKind::AreaSet);
    call(&router, "POST", "/api/surface/events", Some(square("d1"))).await;

    let (status, json) = call(&router, "POST", "/api/features/d1/focus", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], "focused");
    assert_eq!(json["data"], json!([0.0, 0.0, 0.01, 0.01]));

    let (_, snapshot) = call(&router, "GET", "/api/workspace", None).await;
    assert_eq!(snapshot["focused"], "d1");
}

#[tokio::test]
async fn marker_without_coordinate_lands_on_map_center() {
    let router = app(WorkspaceKind::MarkerSet);
    let (status, json) = call(&router, "POST", "/api/markers", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["geometry"]["type"], "Point");
    assert_eq!(json["data"]["geometry"]["coordinates"], json!([77.1025, 28.7041]));

    let body = json!({ "coordinate": [10.0, 20.0] });
    let (_, json) = call(&router, "POST", "/api/markers", Some(body)).await;
    assert_eq!(json["data"]["geometry"]["coordinates"], json!([10.0, 20.0]));
    assert_eq!(json["data"]["name"], "Untitled 2");
}

#[tokio::test]
async fn path_points_are_added_and_removed() {
    let router = app(WorkspaceKind::Path);
    call(&router, "POST", "/api/path/points", Some(json!({ "coordinate": [0.0, 0.0] }))).await;
    let (status, json) =
        call(&router, "POST", "/api/path/points", Some(json!({ "coordinate": [0.0, 1.0] }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["derived"]["kind"], "path");
    assert_eq!(json["data"]["derived"]["segment_km"].as_array().unwrap().len(), 1);

    let (status, _) = call(&router, "DELETE", "/api/path/points/5", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, json) = call(&router, "DELETE", "/api/path/points/0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["geometry"]["coordinates"], json!([[0.0, 1.0]]));
}

#[tokio::test]
async fn upload_reports_each_file() {
    let router = app(WorkspaceKind::LayerSet);
    let body = json!({
        "files": [
            { "name": "Parks.geojson", "contents": "{\"type\":\"FeatureCollection\",\"features\":[]}" },
            { "name": "roads.kml", "contents": "<kml/>" },
        ]
    });
    let (status, json) = call(&router, "POST", "/api/layers/upload", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], "uploaded");
    let reports = json["data"].as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["outcome"]["outcome"], "created");
    assert!(reports[1]["error"].is_string());

    let (_, layers) = call(&router, "GET", "/api/layers", None).await;
    let layers = layers.as_array().unwrap();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0]["name"], "parks.geojson");

    let layer_id = layers[0]["layer_id"].as_str().unwrap();
    let uri = format!("/api/layers/{layer_id}/visibility");
    let (status, json) = call(&router, "PUT", &uri, Some(json!({ "visible": false }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "result": "visibility", "data": { "applied": true } }));
}

#[tokio::test]
async fn empty_upload_is_a_bad_request() {
    let router = app(WorkspaceKind::LayerSet);
    let (status, _) = call(&router, "POST", "/api/layers/upload", Some(json!({ "files": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sign_in_and_out() {
    let router = app(WorkspaceKind::AreaSet);

    let (status, _) = call(&router, "POST", "/api/auth/sign-in", Some(json!({ "user_id": " " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) =
        call(&router, "POST", "/api/auth/sign-in", Some(json!({ "user_id": "alice" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "user": "alice", "changed": true }));

    let (_, json) = call(&router, "POST", "/api/auth/sign-in", Some(json!({ "user_id": "alice" }))).await;
    assert_eq!(json["changed"], false);

    // Store-bound commands wait for the load, then run scoped to alice.
    let (status, json) = call(&router, "POST", "/api/surface/events", Some(square("d1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["owner_id"], "alice");

    let (_, json) = call(&router, "POST", "/api/auth/sign-out", None).await;
    assert_eq!(json, json!({ "user": null, "changed": true }));

    let (_, json) = call(&router, "GET", "/api/auth/session", None).await;
    assert_eq!(json["user"], Value::Null);
}
