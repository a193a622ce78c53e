// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Licence plate verification pipeline
//!
//! Pipeline:
//! 1. Decode the uploaded photo ([`crate::vision::image_utils`])
//! 2. Localize plate regions ([`detection`])
//! 3. Read the characters of each region ([`recognition`])
//! 4. Normalize and compare with the declared plate ([`normalize`])
//!
//! [`verifier::PlateVerifier`] ties the steps together. Models run on CPU
//! through ONNX Runtime.

pub mod detection;
pub mod error;
pub mod normalize;
pub mod preprocessing;
pub mod recognition;
pub mod verifier;

pub use detection::{
    BoundingBox, CropRegion, DetectionCandidate, OnnxPlateDetector, PlateLocalizer,
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD,
};
pub use error::VerificationError;
pub use normalize::{normalize_plate, plates_match, NormalizedPlate};
pub use preprocessing::DETECTOR_INPUT_SIZE;
pub use recognition::{extract_text, OnnxPlateRecognizer, RecognizedText, TextRecognizer};
pub use verifier::{PlateVerifier, VerificationResult, VerifierConfig};
