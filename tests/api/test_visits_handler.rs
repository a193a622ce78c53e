// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Gate-pass handler tests
//!
//! Handlers are called directly with a fake plate verifier so no models
//! are needed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use entry_shield::api::visits::{
    create_visit_handler, delete_visit_handler, list_visits_handler, update_visit_status_handler,
    UpdateStatusRequest,
};
use entry_shield::api::{ApiError, AppState};
use entry_shield::gate_pass::{GatePassStatus, NewGatePass};
use entry_shield::storage::{GatePassStore, InMemoryGatePassStore};
use entry_shield::vision::plate::{
    BoundingBox, DetectionCandidate, PlateLocalizer, RecognizedText, TextRecognizer,
    VerificationError,
};
use entry_shield::vision::{PlateVerifier, VerifierConfig};
use image::{ImageFormat, RgbImage};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

struct OneBoxLocalizer;

impl PlateLocalizer for OneBoxLocalizer {
    fn detect(
        &self,
        _image: &RgbImage,
        _min_confidence: f32,
    ) -> Result<Vec<DetectionCandidate>, VerificationError> {
        Ok(vec![DetectionCandidate::new(
            BoundingBox::new(10.0, 10.0, 90.0, 40.0),
            0.9,
        )])
    }

    fn name(&self) -> &'static str {
        "one-box"
    }
}

struct FixedReader(&'static str);

impl TextRecognizer for FixedReader {
    fn recognize(&self, _region: &RgbImage) -> Result<Vec<RecognizedText>, VerificationError> {
        Ok(vec![RecognizedText::new(self.0, 0.95)])
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn state_reading(plate: Option<&'static str>) -> AppState {
    let verifier = plate.map(|p| {
        Arc::new(PlateVerifier::new(
            Arc::new(OneBoxLocalizer),
            Arc::new(FixedReader(p)),
            VerifierConfig::default(),
        ))
    });
    AppState::new(Arc::new(InMemoryGatePassStore::new()), verifier)
}

fn photo() -> String {
    let mut buf = Vec::new();
    RgbImage::new(120, 60)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(buf))
}

fn submission(body: serde_json::Value) -> Json<NewGatePass> {
    Json(serde_json::from_value(body).unwrap())
}

#[tokio::test]
async fn test_create_without_photo_is_pending_review() {
    let state = state_reading(Some("KA01AB1234"));

    let (status, Json(response)) = create_visit_handler(
        State(state.clone()),
        submission(json!({
            "receiptId": "R-1",
            "studentId": "S-1",
            "vehicleNumber": "KA01AB1234"
        })),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response.message, "Gate Pass Processed");
    assert_eq!(response.detected_plate, "");
    assert!(!response.is_match);

    let stored = state.store.list().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, response.id);
    assert_eq!(stored[0].status, GatePassStatus::PendingReview);
}

#[tokio::test]
async fn test_create_with_matching_photo_is_approved() {
    let state = state_reading(Some("KA01AB1234"));

    let (_, Json(response)) = create_visit_handler(
        State(state.clone()),
        submission(json!({
            "receiptId": "R-1",
            "vehicleNumber": "ka-01-ab-1234",
            "vehicleNoPhoto": photo(),
            "visitorName": "Asha"
        })),
    )
    .await
    .unwrap();

    assert_eq!(response.detected_plate, "KA01AB1234");
    assert!(response.is_match);

    let stored = &state.store.list().await.unwrap()[0];
    assert_eq!(stored.status, GatePassStatus::Approved);
    assert_eq!(stored.ocr_plate_detected, "KA01AB1234");
    assert!(stored.plate_match_success);
    assert_eq!(stored.extra.get("visitorName"), Some(&json!("Asha")));
}

#[tokio::test]
async fn test_create_with_mismatched_photo_is_pending_review() {
    let state = state_reading(Some("XY9999"));

    let (_, Json(response)) = create_visit_handler(
        State(state.clone()),
        submission(json!({
            "vehicleNumber": "KA01AB1234",
            "vehicleNoPhoto": photo()
        })),
    )
    .await
    .unwrap();

    assert_eq!(response.detected_plate, "XY9999");
    assert!(!response.is_match);
    assert_eq!(
        state.store.list().await.unwrap()[0].status,
        GatePassStatus::PendingReview
    );
}

#[tokio::test]
async fn test_create_with_corrupt_photo_still_stores() {
    let state = state_reading(Some("KA01AB1234"));

    let (status, Json(response)) = create_visit_handler(
        State(state.clone()),
        submission(json!({
            "vehicleNumber": "KA01AB1234",
            "vehicleNoPhoto": "data:image/jpeg;base64,garbage"
        })),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response.detected_plate, "");
    assert!(!response.is_match);
    assert_eq!(state.store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_without_verifier_records_no_detection() {
    let state = state_reading(None);

    let (_, Json(response)) = create_visit_handler(
        State(state.clone()),
        submission(json!({
            "vehicleNumber": "KA01AB1234",
            "vehicleNoPhoto": photo()
        })),
    )
    .await
    .unwrap();

    assert_eq!(response.detected_plate, "");
    assert!(!response.is_match);
}

#[tokio::test]
async fn test_create_ignores_client_supplied_outcome() {
    let state = state_reading(None);

    create_visit_handler(
        State(state.clone()),
        submission(json!({
            "receiptId": "R-1",
            "status": "approved",
            "plate_match_success": true,
            "ocr_plate_detected": "FAKE"
        })),
    )
    .await
    .unwrap();

    let stored = &state.store.list().await.unwrap()[0];
    assert_eq!(stored.status, GatePassStatus::PendingReview);
    assert!(!stored.plate_match_success);
    assert_eq!(stored.ocr_plate_detected, "");
    assert!(stored.extra.is_empty());
}

#[tokio::test]
async fn test_duplicate_student_id_conflicts() {
    let state = state_reading(None);

    create_visit_handler(
        State(state.clone()),
        submission(json!({ "receiptId": "R-1", "studentId": "S-1" })),
    )
    .await
    .unwrap();

    let err = create_visit_handler(
        State(state.clone()),
        submission(json!({ "receiptId": "R-2", "studentId": "S-1" })),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(err.status_code(), 409);
    assert_eq!(state.store.list().await.unwrap().len(), 1);

    // Submissions without a student id never conflict
    for receipt in ["R-3", "R-4"] {
        create_visit_handler(State(state.clone()), submission(json!({ "receiptId": receipt })))
            .await
            .unwrap();
    }
    assert_eq!(state.store.list().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_list_newest_first() {
    let state = state_reading(None);

    for receipt in ["R-1", "R-2", "R-3"] {
        create_visit_handler(State(state.clone()), submission(json!({ "receiptId": receipt })))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let Json(records) = list_visits_handler(State(state)).await.unwrap();
    let receipts: Vec<_> = records
        .iter()
        .map(|r| r.receipt_id.as_deref().unwrap())
        .collect();
    assert_eq!(receipts, vec!["R-3", "R-2", "R-1"]);
}

#[tokio::test]
async fn test_update_status() {
    let state = state_reading(None);
    create_visit_handler(State(state.clone()), submission(json!({ "receiptId": "R-1" })))
        .await
        .unwrap();

    let Json(response) = update_visit_status_handler(
        State(state.clone()),
        Path("R-1".to_string()),
        Json(UpdateStatusRequest {
            status: Some("approved".to_string()),
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.message, "Status updated to approved");
    assert_eq!(
        state.store.list().await.unwrap()[0].status,
        GatePassStatus::Approved
    );
}

#[tokio::test]
async fn test_update_status_rejects_unknown_value() {
    let state = state_reading(None);
    create_visit_handler(State(state.clone()), submission(json!({ "receiptId": "R-1" })))
        .await
        .unwrap();

    for status in [Some("maybe".to_string()), None] {
        let err = update_visit_status_handler(
            State(state.clone()),
            Path("R-1".to_string()),
            Json(UpdateStatusRequest { status }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    assert_eq!(
        state.store.list().await.unwrap()[0].status,
        GatePassStatus::PendingReview
    );
}

#[tokio::test]
async fn test_update_status_unknown_receipt() {
    let state = state_reading(None);

    let err = update_visit_status_handler(
        State(state),
        Path("missing".to_string()),
        Json(UpdateStatusRequest {
            status: Some("rejected".to_string()),
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(err, ApiError::receipt_not_found());
}

#[tokio::test]
async fn test_delete() {
    let state = state_reading(None);
    create_visit_handler(State(state.clone()), submission(json!({ "receiptId": "R-1" })))
        .await
        .unwrap();

    let Json(response) = delete_visit_handler(State(state.clone()), Path("R-1".to_string()))
        .await
        .unwrap();
    assert_eq!(response.message, "Gate pass deleted successfully");
    assert!(state.store.list().await.unwrap().is_empty());

    let err = delete_visit_handler(State(state), Path("R-1".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}
