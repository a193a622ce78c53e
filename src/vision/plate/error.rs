// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Failure taxonomy for plate verification
//!
//! None of these escape [`super::PlateVerifier::verify`]; they are logged
//! and folded into a "no detection" result there.

use thiserror::Error;

use crate::vision::image_utils::ImageError;

#[derive(Debug, Error)]
pub enum VerificationError {
    /// Malformed or corrupt image payload
    #[error("Image decode failed: {0}")]
    Decode(#[from] ImageError),

    /// Detection model failed or produced unusable output
    #[error("Plate detection failed: {0}")]
    Detection(String),

    /// Recognition model failed on a single region
    #[error("Text recognition failed: {0}")]
    Recognition(String),

    /// Anything else, including panics inside model code
    #[error("Internal verification error: {0}")]
    Internal(String),
}

impl VerificationError {
    pub fn detection(msg: impl std::fmt::Display) -> Self {
        VerificationError::Detection(msg.to_string())
    }

    pub fn recognition(msg: impl std::fmt::Display) -> Self {
        VerificationError::Recognition(msg.to_string())
    }

    /// Short machine-readable label used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationError::Decode(_) => "decode_error",
            VerificationError::Detection(_) => "detection_failure",
            VerificationError::Recognition(_) => "recognition_failure",
            VerificationError::Internal(_) => "internal_error",
        }
    }
}
