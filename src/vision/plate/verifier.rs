// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Plate verification orchestrator
//!
//! Composes decoding, localization, recognition and matching into a single
//! call that always produces a [`VerificationResult`]. Every failure inside
//! the pipeline is logged and reported as "no detection".

use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::detection::{PlateLocalizer, DEFAULT_CONFIDENCE_THRESHOLD};
use super::error::VerificationError;
use super::normalize::NormalizedPlate;
use super::recognition::{extract_text, TextRecognizer};
use crate::vision::image_utils::decode_base64_image;

/// Default upper bound on a detached verification
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of verifying a photo against a declared plate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Normalized plate read from the photo, empty when nothing was read
    pub detected_plate: String,
    /// True only when both plates are non-empty and one contains the other
    pub is_match: bool,
}

impl VerificationResult {
    pub fn no_detection() -> Self {
        Self::default()
    }

    fn from_plates(detected: NormalizedPlate, declared: &NormalizedPlate) -> Self {
        let is_match = detected.matches(declared);
        Self {
            detected_plate: detected.into_string(),
            is_match,
        }
    }
}

/// Tunables for [`PlateVerifier`]
#[derive(Debug, Clone, PartialEq)]
pub struct VerifierConfig {
    /// Minimum detector confidence for a candidate region
    pub confidence_threshold: f32,
    /// Limit for [`PlateVerifier::verify_async`]; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            timeout: Some(DEFAULT_VERIFY_TIMEOUT),
        }
    }
}

/// Verifies gate photos against declared plates
///
/// Holds the detector and recognizer as shared capabilities. Each
/// capability serializes its own inference calls, so one verifier can
/// serve concurrent requests.
pub struct PlateVerifier {
    localizer: Arc<dyn PlateLocalizer>,
    recognizer: Arc<dyn TextRecognizer>,
    config: VerifierConfig,
}

impl std::fmt::Debug for PlateVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlateVerifier")
            .field("localizer", &self.localizer.name())
            .field("recognizer", &self.recognizer.name())
            .field("config", &self.config)
            .finish()
    }
}

impl PlateVerifier {
    pub fn new(
        localizer: Arc<dyn PlateLocalizer>,
        recognizer: Arc<dyn TextRecognizer>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            localizer,
            recognizer,
            config,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn localizer_name(&self) -> &'static str {
        self.localizer.name()
    }

    pub fn recognizer_name(&self) -> &'static str {
        self.recognizer.name()
    }

    /// Verify a photo against a declared plate
    ///
    /// Never fails: a missing or undecodable photo, a detector error or a
    /// panic inside model code all yield an empty `detected_plate` and
    /// `is_match == false`.
    pub fn verify(&self, image_payload: Option<&str>, declared_plate: Option<&str>) -> VerificationResult {
        let declared = NormalizedPlate::new(declared_plate);

        let payload = match image_payload {
            Some(payload) => payload,
            None => {
                debug!("No image supplied, skipping plate detection");
                return VerificationResult::no_detection();
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.read_plate(payload)))
            .unwrap_or_else(|panic| Err(VerificationError::Internal(panic_message(&*panic))));

        let detected = match outcome {
            Ok(detected) => detected.unwrap_or_default(),
            Err(e @ VerificationError::Decode(_)) => {
                warn!(kind = e.kind(), "Plate verification skipped: {}", e);
                NormalizedPlate::default()
            }
            Err(e) => {
                error!(kind = e.kind(), "Plate verification failed: {}", e);
                NormalizedPlate::default()
            }
        };

        let result = VerificationResult::from_plates(detected, &declared);
        info!(
            "Plate verification: detected={:?} declared={:?} match={}",
            result.detected_plate,
            declared.as_str(),
            result.is_match
        );
        result
    }

    /// Decode the payload and read the first legible plate
    ///
    /// Candidates are tried in detector order and the first one whose text
    /// normalizes to something non-empty wins; later candidates are not
    /// consulted. Detector and per-region recognizer failures are recovered
    /// here. Decode failures propagate.
    pub fn read_plate(&self, image_payload: &str) -> Result<Option<NormalizedPlate>, VerificationError> {
        let (image, info) = decode_base64_image(image_payload)?;
        debug!(
            "Decoded gate photo: {}x{} {:?} ({} bytes)",
            info.width, info.height, info.format, info.size_bytes
        );

        let candidates = match self.localizer.detect(&image, self.config.confidence_threshold) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    detector = self.localizer.name(),
                    "Plate detection failed, treating as no candidates: {}", e
                );
                Vec::new()
            }
        };

        if candidates.is_empty() {
            debug!("No plate candidates found");
            return Ok(None);
        }

        for (index, candidate) in candidates.iter().enumerate() {
            let Some(region) = candidate.crop(&image) else {
                debug!(index, "Skipping degenerate candidate {:?}", candidate.bounding_box);
                continue;
            };

            let reading = match extract_text(self.recognizer.as_ref(), &region) {
                Ok(reading) => reading,
                Err(e) => {
                    warn!(index, "Recognition failed for candidate: {}", e);
                    continue;
                }
            };

            let Some(reading) = reading else {
                debug!(index, confidence = candidate.confidence, "Candidate had no legible text");
                continue;
            };

            let plate = NormalizedPlate::from(reading.text.as_str());
            if plate.is_empty() {
                continue;
            }

            debug!(
                index,
                detection_confidence = candidate.confidence,
                text_confidence = reading.confidence,
                "Read plate {}",
                plate
            );
            return Ok(Some(plate));
        }

        Ok(None)
    }

    /// Run [`verify`](Self::verify) on the blocking pool under the
    /// configured timeout
    ///
    /// Expiry or a lost worker is reported as "no detection". The detached
    /// work keeps running to completion after a timeout.
    pub async fn verify_async(
        self: Arc<Self>,
        image_payload: Option<String>,
        declared_plate: Option<String>,
    ) -> VerificationResult {
        if image_payload.is_none() {
            return self.verify(None, declared_plate.as_deref());
        }

        let limit = self.config.timeout;
        let task = tokio::task::spawn_blocking(move || {
            self.verify(image_payload.as_deref(), declared_plate.as_deref())
        });

        let joined = match limit {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("Plate verification timed out after {:?}", limit);
                    return VerificationResult::no_detection();
                }
            },
            None => task.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) => {
                error!("Plate verification task failed: {}", e);
                VerificationResult::no_detection()
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panic: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panic: {}", msg)
    } else {
        "panic in verification pipeline".to_string()
    }
}
