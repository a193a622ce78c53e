// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Plate model manager for loading the detector and recognizer once

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::vision::plate::{
    OnnxPlateDetector, OnnxPlateRecognizer, PlateVerifier, VerifierConfig,
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD, DETECTOR_INPUT_SIZE,
};

/// Model file locations and runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateModelConfig {
    /// Dedicated plate detector
    pub detector_model_path: PathBuf,
    /// General-purpose detector used when the plate detector is missing
    pub fallback_detector_model_path: Option<PathBuf>,
    /// CTC recognizer
    pub recognizer_model_path: PathBuf,
    /// Character dictionary; the built-in English set when unset
    pub dictionary_path: Option<PathBuf>,
    /// Recognition languages (only `["en"]` is supported)
    pub languages: Vec<String>,
    /// ONNX Runtime intra-op threads per session
    pub intra_threads: usize,
    /// Square detector input size
    pub detector_input_size: u32,
}

impl Default for PlateModelConfig {
    fn default() -> Self {
        Self {
            detector_model_path: PathBuf::from("./models/plate_detector.onnx"),
            fallback_detector_model_path: Some(PathBuf::from("./models/yolov8n.onnx")),
            recognizer_model_path: PathBuf::from("./models/plate_rec.onnx"),
            dictionary_path: None,
            languages: vec!["en".to_string()],
            intra_threads: 4,
            detector_input_size: DETECTOR_INPUT_SIZE,
        }
    }
}

/// Verification thresholds and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Minimum detector confidence
    pub confidence_threshold: f32,
    /// IoU above which overlapping detections are suppressed
    pub nms_iou_threshold: f32,
    /// Per-request limit in milliseconds; 0 disables it
    pub timeout_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_iou_threshold: DEFAULT_IOU_THRESHOLD,
            timeout_ms: 30_000,
        }
    }
}

impl VerificationConfig {
    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            confidence_threshold: self.confidence_threshold,
            timeout: (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)),
        }
    }
}

/// Information about a loaded plate model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateModelInfo {
    /// Model name
    pub name: String,
    /// Model type (detector, recognizer)
    pub model_type: String,
    /// Whether the model is available
    pub available: bool,
}

/// Manager for the plate detector and recognizer
///
/// Missing or broken model files are handled gracefully: the service runs
/// without a verifier and records visits as "no detection".
pub struct PlateModelManager {
    detector: Option<Arc<OnnxPlateDetector>>,
    recognizer: Option<Arc<OnnxPlateRecognizer>>,
    verifier: Option<Arc<PlateVerifier>>,
}

impl PlateModelManager {
    /// Load both models and assemble the verifier when both are present
    pub fn load(models: &PlateModelConfig, verification: &VerificationConfig) -> Self {
        let detector = Self::load_detector(models, verification).map(Arc::new);

        let recognizer = match OnnxPlateRecognizer::new(
            &models.recognizer_model_path,
            models.dictionary_path.as_deref(),
            &models.languages,
            models.intra_threads,
        ) {
            Ok(model) => {
                tracing::info!(
                    "✅ Plate recognizer loaded from {}",
                    models.recognizer_model_path.display()
                );
                Some(Arc::new(model))
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Failed to load plate recognizer from {}: {:#}",
                    models.recognizer_model_path.display(),
                    e
                );
                None
            }
        };

        let verifier = match (&detector, &recognizer) {
            (Some(detector), Some(recognizer)) => Some(Arc::new(PlateVerifier::new(
                detector.clone(),
                recognizer.clone(),
                verification.verifier_config(),
            ))),
            _ => {
                tracing::warn!("⚠️ Plate verification unavailable, visits will be recorded without detection");
                None
            }
        };

        Self {
            detector,
            recognizer,
            verifier,
        }
    }

    /// Try the plate detector first, then the fallback
    fn load_detector(
        models: &PlateModelConfig,
        verification: &VerificationConfig,
    ) -> Option<OnnxPlateDetector> {
        let attempts = std::iter::once(models.detector_model_path.as_path())
            .chain(models.fallback_detector_model_path.as_deref());

        for path in attempts {
            match Self::open_detector(path, models, verification) {
                Ok(model) => {
                    tracing::info!("✅ Plate detector loaded from {}", path.display());
                    return Some(model);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to load plate detector from {}: {:#}", path.display(), e);
                }
            }
        }

        None
    }

    fn open_detector(
        path: &Path,
        models: &PlateModelConfig,
        verification: &VerificationConfig,
    ) -> anyhow::Result<OnnxPlateDetector> {
        Ok(OnnxPlateDetector::new(path, models.intra_threads)?
            .with_input_size(models.detector_input_size)
            .with_iou_threshold(verification.nms_iou_threshold))
    }

    /// Get the verifier if both models loaded
    pub fn verifier(&self) -> Option<Arc<PlateVerifier>> {
        self.verifier.clone()
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    /// List both plate models and their availability
    pub fn list_models(&self) -> Vec<PlateModelInfo> {
        vec![
            PlateModelInfo {
                name: self
                    .detector
                    .as_ref()
                    .and_then(|d| d.model_path().file_name())
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "plate-detector".to_string()),
                model_type: "detector".to_string(),
                available: self.detector.is_some(),
            },
            PlateModelInfo {
                name: "plate-recognizer".to_string(),
                model_type: "recognizer".to_string(),
                available: self.recognizer.is_some(),
            },
        ]
    }
}
