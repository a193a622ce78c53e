// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gate-pass domain types
//!
//! A gate pass is one visitor or vehicle entry submission. Clients may send
//! fields beyond the known ones; those are kept in an open map and stored
//! alongside the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::vision::VerificationResult;

/// Field names the service owns; client values for these are dropped
pub const RESERVED_FIELDS: &[&str] = &[
    "_id",
    "ocr_plate_detected",
    "plate_match_success",
    "status",
    "submittedAt",
];

/// Approval state of a gate pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePassStatus {
    Approved,
    PendingReview,
    Rejected,
}

impl GatePassStatus {
    /// Initial status from the plate check
    pub fn from_match(is_match: bool) -> Self {
        if is_match {
            GatePassStatus::Approved
        } else {
            GatePassStatus::PendingReview
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GatePassStatus::Approved => "approved",
            GatePassStatus::PendingReview => "pending_review",
            GatePassStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for GatePassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid status '{0}', expected one of: approved, pending_review, rejected")]
pub struct InvalidStatus(pub String);

impl FromStr for GatePassStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(GatePassStatus::Approved),
            "pending_review" => Ok(GatePassStatus::PendingReview),
            "rejected" => Ok(GatePassStatus::Rejected),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// Gate-pass submission as sent by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGatePass {
    /// Receipt identifier used by the status and delete routes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    /// Unique per gate pass when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    /// Declared vehicle plate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_number: Option<String>,
    /// Base64 photo of the vehicle, optionally a data URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_no_photo: Option<String>,
    /// Every other member of the submission
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Stored gate pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatePassRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "receiptId", default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(rename = "studentId", default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(rename = "vehicleNumber", default, skip_serializing_if = "Option::is_none")]
    pub vehicle_number: Option<String>,
    #[serde(rename = "vehicleNoPhoto", default, skip_serializing_if = "Option::is_none")]
    pub vehicle_no_photo: Option<String>,
    /// Normalized plate read from the photo, empty when none
    pub ocr_plate_detected: String,
    pub plate_match_success: bool,
    pub status: GatePassStatus,
    #[serde(rename = "submittedAt")]
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GatePassRecord {
    /// Build the record for a submission and its verification outcome
    pub fn from_submission(submission: NewGatePass, verification: &VerificationResult) -> Self {
        let mut extra = submission.extra;
        for field in RESERVED_FIELDS {
            if extra.remove(*field).is_some() {
                tracing::debug!("Ignoring client-supplied reserved field '{}'", field);
            }
        }

        Self {
            id: Uuid::new_v4().to_string(),
            receipt_id: submission.receipt_id,
            student_id: submission.student_id,
            vehicle_number: submission.vehicle_number,
            vehicle_no_photo: submission.vehicle_no_photo,
            ocr_plate_detected: verification.detected_plate.clone(),
            plate_match_success: verification.is_match,
            status: GatePassStatus::from_match(verification.is_match),
            submitted_at: Utc::now(),
            extra,
        }
    }
}
