// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gate-pass request types
//!
//! The create body is [`crate::gate_pass::NewGatePass`]; only the status
//! update needs its own type.

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::gate_pass::GatePassStatus;

/// Body of `PUT /api/visits/:receipt_id/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

impl UpdateStatusRequest {
    /// Parse the requested status
    pub fn validate(&self) -> Result<GatePassStatus, ApiError> {
        let raw = self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::ValidationError {
                field: "status".to_string(),
                message: "status is required".to_string(),
            })?;

        raw.parse().map_err(|e: crate::gate_pass::InvalidStatus| ApiError::ValidationError {
            field: "status".to_string(),
            message: e.to_string(),
        })
    }
}
