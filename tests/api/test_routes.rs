// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Route registration tests
//!
//! Drives the full router with `oneshot` to check paths, methods, status
//! codes and wire field names.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use entry_shield::api::{create_router, AppState, MAX_REQUEST_BODY_SIZE};
use entry_shield::storage::InMemoryGatePassStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn app() -> Router {
    create_router(AppState::new(Arc::new(InMemoryGatePassStore::new()), None))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_root_reports_live() {
    let (status, body) = call(&app(), Method::GET, "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Live");
    assert_eq!(body["database"], "in-memory connected");
}

#[tokio::test]
async fn test_health_reports_verifier() {
    let (status, body) = call(&app(), Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["verifierAvailable"], false);
    assert_eq!(body["store"], "in-memory");
    assert!(body["models"].is_array());
}

#[tokio::test]
async fn test_visit_lifecycle_over_http() {
    let app = app();

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/visits",
        Some(json!({ "receiptId": "R-1", "studentId": "S-1", "vehicleNumber": "KA01AB1234" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Gate Pass Processed");
    assert_eq!(created["detected_plate"], "");
    assert_eq!(created["match"], false);
    assert!(created["id"].is_string());

    let (status, listed) = call(&app, Method::GET, "/api/visits", None).await;
    assert_eq!(status, StatusCode::OK);
    let first = &listed[0];
    assert_eq!(first["_id"], created["id"]);
    assert_eq!(first["receiptId"], "R-1");
    assert_eq!(first["status"], "pending_review");
    assert_eq!(first["ocr_plate_detected"], "");
    assert_eq!(first["plate_match_success"], false);
    assert!(first["submittedAt"].is_string());

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/visits/R-1/status",
        Some(json!({ "status": "rejected" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Status updated to rejected");

    let (status, body) = call(&app, Method::DELETE, "/api/visits/R-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Gate pass deleted successfully");

    let (_, listed) = call(&app, Method::GET, "/api/visits", None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_duplicate_student_over_http() {
    let app = app();
    let body = json!({ "studentId": "S-1" });

    let (status, _) = call(&app, Method::POST, "/api/visits", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = call(&app, Method::POST, "/api/visits", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(error["error"].as_str().unwrap().contains("S-1"));
}

#[tokio::test]
async fn test_not_found_body() {
    let app = app();

    let (status, body) = call(&app, Method::DELETE, "/api/visits/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Receipt not found" }));

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/visits/nope/status",
        Some(json!({ "status": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Receipt not found" }));
}

#[tokio::test]
async fn test_invalid_status_is_bad_request() {
    let app = app();
    call(
        &app,
        Method::POST,
        "/api/visits",
        Some(json!({ "receiptId": "R-1" })),
    )
    .await;

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/visits/R-1/status",
        Some(json!({ "status": "maybe" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (status, _) = call(&app(), Method::GET, "/api/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let (status, _) = call(&app(), Method::DELETE, "/api/visits", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_large_photo_submission_is_accepted() {
    let app = app();

    // ~3.4 MB of base64, above axum's 2 MB default body limit
    let photo = format!("data:image/jpeg;base64,{}", "A".repeat(3_400_000));
    let (status, created) = call(
        &app,
        Method::POST,
        "/api/visits",
        Some(json!({ "receiptId": "R-big", "vehicleNumber": "KA01AB1234", "vehicleNoPhoto": photo })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["detected_plate"], "");

    let (_, listed) = call(&app, Method::GET, "/api/visits", None).await;
    assert_eq!(listed[0]["receiptId"], "R-big");
}

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let photo = "A".repeat(MAX_REQUEST_BODY_SIZE + 1);
    let (status, _) = call(
        &app(),
        Method::POST,
        "/api/visits",
        Some(json!({ "vehicleNoPhoto": photo })),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
