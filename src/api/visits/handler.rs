// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gate-pass endpoint handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, error, info, warn};

use super::request::UpdateStatusRequest;
use super::response::{CreateVisitResponse, MessageResponse};
use crate::api::errors::ApiError;
use crate::api::server::AppState;
use crate::gate_pass::{GatePassRecord, NewGatePass};
use crate::storage::StoreError;
use crate::vision::VerificationResult;

/// POST /api/visits - Register a gate pass
///
/// Reads the plate from `vehicleNoPhoto`, compares it with
/// `vehicleNumber` and stores the submission with the outcome. Plate
/// verification never fails the request; an unreadable photo is recorded
/// as "no detection" with status `pending_review`.
///
/// # Errors
/// - 409 Conflict: `studentId` already registered
/// - 500 Internal Server Error: storage failure
pub async fn create_visit_handler(
    State(state): State<AppState>,
    Json(submission): Json<NewGatePass>,
) -> Result<(StatusCode, Json<CreateVisitResponse>), ApiError> {
    debug!(
        "Gate pass submission: receipt={:?} photo={}",
        submission.receipt_id,
        submission.vehicle_no_photo.is_some()
    );

    let verification = match (&state.verifier, &submission.vehicle_no_photo) {
        (Some(verifier), Some(photo)) => {
            verifier
                .clone()
                .verify_async(Some(photo.clone()), submission.vehicle_number.clone())
                .await
        }
        (None, Some(_)) => {
            warn!("Plate verifier unavailable, recording gate pass without detection");
            VerificationResult::no_detection()
        }
        (_, None) => VerificationResult::no_detection(),
    };

    let record = GatePassRecord::from_submission(submission, &verification);
    let status = record.status;

    let id = state.store.insert(record).await.map_err(|e| {
        match &e {
            StoreError::Duplicate { .. } => warn!("Gate pass rejected: {}", e),
            StoreError::Backend(_) => error!("Failed to store gate pass: {}", e),
        }
        ApiError::from(e)
    })?;

    info!(
        "Gate pass {} processed: detected={:?} match={} status={}",
        id, verification.detected_plate, verification.is_match, status
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateVisitResponse::new(id, &verification)),
    ))
}

/// GET /api/visits - All gate passes, newest first
pub async fn list_visits_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<GatePassRecord>>, ApiError> {
    let records = state.store.list().await.map_err(|e| {
        error!("Failed to list gate passes: {}", e);
        ApiError::from(e)
    })?;

    debug!("Listing {} gate passes", records.len());
    Ok(Json(records))
}

/// PUT /api/visits/:receipt_id/status - Approve, reject or re-queue a gate pass
///
/// # Errors
/// - 400 Bad Request: missing or unknown status
/// - 404 Not Found: no gate pass with this receipt
pub async fn update_visit_status_handler(
    State(state): State<AppState>,
    Path(receipt_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let status = request.validate().map_err(|e| {
        warn!("Status update for {} rejected: {}", receipt_id, e);
        e
    })?;

    let updated = state
        .store
        .update_status(&receipt_id, status)
        .await
        .map_err(|e| {
            error!("Failed to update gate pass {}: {}", receipt_id, e);
            ApiError::from(e)
        })?;

    if !updated {
        return Err(ApiError::receipt_not_found());
    }

    Ok(Json(MessageResponse::new(format!(
        "Status updated to {}",
        status
    ))))
}

/// DELETE /api/visits/:receipt_id - Permanently remove a gate pass
pub async fn delete_visit_handler(
    State(state): State<AppState>,
    Path(receipt_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let deleted = state.store.delete(&receipt_id).await.map_err(|e| {
        error!("Failed to delete gate pass {}: {}", receipt_id, e);
        ApiError::from(e)
    })?;

    if !deleted {
        return Err(ApiError::receipt_not_found());
    }

    Ok(Json(MessageResponse::new("Gate pass deleted successfully")))
}
