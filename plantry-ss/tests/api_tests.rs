//! HTTP API tests
//!
//! Exercises the axum router in-process with `tower::ServiceExt::oneshot`:
//! session lifecycle, error envelope shape, settings validation, health.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serial_test::serial;
use tower::util::ServiceExt;

use helpers::{fixture, FixtureConfig};
use plantry_common::events::EventBus;
use plantry_ss::{build_router, AppState};

async fn test_state() -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let pool = plantry_ss::db::init_database_pool(&dir.path().join("plantry.db"))
        .await
        .unwrap();

    let fx = fixture();
    let deps = fx.deps(FixtureConfig::default());
    let state = AppState::new(
        pool,
        EventBus::new(64),
        deps,
        dir.path().join("packet_images"),
    );
    (dir, state)
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_module_and_sessions() {
    let (_dir, state) = test_state().await;
    let app = build_router(state);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["module"], "plantry-ss");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_sessions"], 0);
}

#[tokio::test]
async fn scan_session_lifecycle_over_http() {
    let (_dir, state) = test_state().await;
    let app = build_router(state);

    // Open
    let response = app.clone().oneshot(post_empty("/scan/start")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["step"], "choice");
    let session_id = body["session_id"].as_str().unwrap().to_string();

    // Pick the barcode path
    let response = app
        .clone()
        .oneshot(post_empty(&format!("/scan/{}/select-barcode", session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["step"], "barcode_scan");

    // Decode a known barcode
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/scan/{}/barcode", session_id),
            serde_json::json!({ "barcode": "0123456789012" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["step"], "found");
    assert_eq!(body["product"]["product_name"], "Cherokee Purple Tomato");
    assert_eq!(body["scanned_barcode"], "0123456789012");

    // Close discards the session
    let response = app
        .clone()
        .oneshot(post_empty(&format!("/scan/{}/close", session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/scan/status/{}", session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_session_is_a_404_with_error_envelope() {
    let (_dir, state) = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(get("/scan/status/3f0b0f56-9c46-4d8e-a34e-3d2f2a2b9f10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Scan session not found"));
}

#[tokio::test]
async fn step_violations_are_conflicts() {
    let (_dir, state) = test_state().await;
    let app = build_router(state);

    let response = app.clone().oneshot(post_empty("/scan/start")).await.unwrap();
    let session_id = json_body(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Confirm straight from choice is not a defined transition
    let response = app
        .oneshot(post_empty(&format!("/scan/{}/confirm", session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn malformed_frame_payload_is_a_400() {
    let (_dir, state) = test_state().await;
    let app = build_router(state);

    let response = app.clone().oneshot(post_empty("/scan/start")).await.unwrap();
    let session_id = json_body(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    app.clone()
        .oneshot(post_empty(&format!("/scan/{}/select-photo", session_id)))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/scan/{}/frame", session_id),
            serde_json::json!({ "image_data_url": "not a data url" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn settings_endpoint_validates_and_persists_the_key() {
    // Keep the best-effort TOML backup inside the sandbox
    let config_home = tempfile::tempdir().unwrap();
    std::env::set_var("XDG_CONFIG_HOME", config_home.path());

    let (_dir, state) = test_state().await;
    let db = state.db.clone();
    let app = build_router(state);

    // Whitespace-only key is rejected before any write
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/settings/extraction_api_key",
            serde_json::json!({ "api_key": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Valid key lands in the database (authoritative tier)
    let response = app
        .oneshot(post_json(
            "/api/settings/extraction_api_key",
            serde_json::json!({ "api_key": "vision-key-123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["success"].as_bool().unwrap());

    let stored = plantry_ss::db::settings::get_extraction_api_key(&db)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some("vision-key-123"));

    std::env::remove_var("XDG_CONFIG_HOME");
}

#[tokio::test]
async fn scan_history_endpoint_returns_rows() {
    let (_dir, state) = test_state().await;
    let db = state.db.clone();
    let app = build_router(state);

    let response = app.clone().oneshot(get("/scan/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 0);

    plantry_ss::db::scan_history::record_scan(&db, "0123456789012", true)
        .await
        .unwrap();

    let response = app.oneshot(get("/scan/history?limit=5")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["barcode"], "0123456789012");
    assert_eq!(body[0]["found"], true);
}
