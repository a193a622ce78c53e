// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gate-pass response types

use serde::{Deserialize, Serialize};

use crate::vision::VerificationResult;

/// Reply to `POST /api/visits`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVisitResponse {
    pub message: String,
    /// Id of the stored record
    pub id: String,
    /// Normalized plate read from the photo, empty when none
    pub detected_plate: String,
    #[serde(rename = "match")]
    pub is_match: bool,
}

impl CreateVisitResponse {
    pub fn new(id: String, verification: &VerificationResult) -> Self {
        Self {
            message: "Gate Pass Processed".to_string(),
            id,
            detected_plate: verification.detected_plate.clone(),
            is_match: verification.is_match,
        }
    }
}

/// Plain confirmation reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
