// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for gate photos
//!
//! This module provides:
//! - Image decoding of uploaded photos
//! - Licence plate detection, recognition and matching
//!
//! All models run on CPU.

pub mod image_utils;
pub mod model_manager;
pub mod plate;

pub use image_utils::{decode_base64_image, decode_image_bytes, detect_format, DecodedImage, ImageError, ImageInfo};
pub use model_manager::{PlateModelConfig, PlateModelInfo, PlateModelManager, VerificationConfig};
pub use plate::{PlateVerifier, VerificationResult, VerifierConfig};
