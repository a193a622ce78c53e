// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Licence plate localization
//!
//! The [`PlateLocalizer`] trait is the detector capability the verifier
//! depends on. [`OnnxPlateDetector`] implements it on top of a YOLOv8
//! ONNX export running on CPU.

use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use ndarray::{ArrayViewD, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::error::VerificationError;
use super::preprocessing::{preprocess_for_detection, PreprocessInfo, DETECTOR_INPUT_SIZE};

/// Default minimum confidence for a detection to be reported
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// Default IoU above which overlapping detections are suppressed
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;

/// Upper bound on candidates returned per image
pub const MAX_DETECTIONS: usize = 300;

/// Axis-aligned box in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Integer pixel rectangle that lies inside an image and has nonzero area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clamp to an image of `width` x `height` pixels
    ///
    /// Coordinates are truncated toward zero. Returns `None` when the
    /// clamped box has no area.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<CropRegion> {
        let clamp = |v: f32, limit: u32| v.max(0.0).min(limit as f32) as u32;

        let x1 = clamp(self.x1, width);
        let y1 = clamp(self.y1, height);
        let x2 = clamp(self.x2, width);
        let y2 = clamp(self.y2, height);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(CropRegion {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

/// A region the detector believes contains a plate
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionCandidate {
    pub bounding_box: BoundingBox,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f32,
}

impl DetectionCandidate {
    pub fn new(bounding_box: BoundingBox, confidence: f32) -> Self {
        Self {
            bounding_box,
            confidence,
        }
    }

    /// Crop this candidate out of `image`, or `None` for a degenerate region
    pub fn crop(&self, image: &RgbImage) -> Option<RgbImage> {
        let region = self.bounding_box.clamp_to(image.width(), image.height())?;
        Some(imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
    }
}

/// Detector capability: image in, candidate plate regions out
///
/// Implementations must only return candidates whose confidence is at
/// least `min_confidence`. Ordering is implementation-defined.
pub trait PlateLocalizer: Send + Sync {
    fn detect(
        &self,
        image: &RgbImage,
        min_confidence: f32,
    ) -> Result<Vec<DetectionCandidate>, VerificationError>;

    /// Detector name for logging
    fn name(&self) -> &'static str;
}

/// YOLOv8 plate detector backed by ONNX Runtime
#[derive(Clone)]
pub struct OnnxPlateDetector {
    /// ONNX Runtime session (one inference at a time)
    session: Arc<Mutex<Session>>,
    /// Model input name
    input_name: String,
    /// Model output name
    output_name: String,
    /// File the model was loaded from
    model_path: PathBuf,
    /// Square input size expected by the model
    input_size: u32,
    /// IoU threshold for non-maximum suppression
    iou_threshold: f32,
}

impl std::fmt::Debug for OnnxPlateDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPlateDetector")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .field("input_size", &self.input_size)
            .field("iou_threshold", &self.iou_threshold)
            .finish_non_exhaustive()
    }
}

impl OnnxPlateDetector {
    /// Load the plate detection model from a file
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    pub fn new<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Plate detection model not found: {}", model_path.display());
        }

        info!("Loading plate detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load plate detection model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .unwrap_or_else(|| "output0".to_string());

        if let Some(input) = session.inputs.first() {
            debug!("Detection model input: {:?}", input.input_type);
        }

        info!("✅ Plate detection model loaded (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
            model_path: model_path.to_path_buf(),
            input_size: DETECTOR_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    /// Override the square model input size (must match the export)
    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size.max(32);
        self
    }

    /// Set the IoU threshold for non-maximum suppression
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl PlateLocalizer for OnnxPlateDetector {
    fn detect(
        &self,
        image: &RgbImage,
        min_confidence: f32,
    ) -> Result<Vec<DetectionCandidate>, VerificationError> {
        let (tensor, info) = preprocess_for_detection(image, self.input_size);

        let mut session = lock_session(&*self.session, self.name());

        let input_value = Value::from_array(tensor)
            .map_err(|e| VerificationError::detection(format!("Failed to create input tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| VerificationError::detection(format!("Detection inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            VerificationError::detection(format!("Model produced no '{}' output", self.output_name))
        })?;

        let output_tensor = output
            .try_extract_array::<f32>()
            .map_err(|e| VerificationError::detection(format!("Failed to extract output tensor: {}", e)))?;

        let raw = parse_yolo_output(output_tensor.view(), min_confidence)?;
        let candidates = finalize_candidates(raw, &info, self.iou_threshold);

        debug!(
            "Detected {} plate candidates (threshold {:.2})",
            candidates.len(),
            min_confidence
        );

        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "yolov8-onnx"
    }
}

/// Lock an inference session, recovering it if a previous call panicked
///
/// A panic mid-inference leaves the session itself usable.
pub(crate) fn lock_session<'a, T>(session: &'a Mutex<T>, model: &str) -> MutexGuard<'a, T> {
    session.lock().unwrap_or_else(|poisoned| {
        warn!("{} session lock was poisoned by a panic, recovering", model);
        session.clear_poison();
        PoisonError::into_inner(poisoned)
    })
}

/// Decode a YOLOv8 output tensor into detector-space candidates
///
/// Accepts `[1, 4 + C, N]` (the default export) or the transposed
/// `[1, N, 4 + C]`. Each prediction is `(cx, cy, w, h, class scores...)`;
/// its confidence is the best class score.
pub fn parse_yolo_output(
    output: ArrayViewD<f32>,
    min_confidence: f32,
) -> Result<Vec<DetectionCandidate>, VerificationError> {
    let output = output
        .into_dimensionality::<Ix3>()
        .map_err(|_| VerificationError::detection("unexpected detector output rank"))?;

    let (batch, dim_a, dim_b) = output.dim();
    if batch != 1 {
        return Err(VerificationError::detection(format!(
            "unexpected detector batch size {}",
            batch
        )));
    }

    // Attribute axis is the short one
    let channels_first = dim_a <= dim_b;
    let (attributes, predictions) = if channels_first {
        (dim_a, dim_b)
    } else {
        (dim_b, dim_a)
    };

    if attributes < 5 {
        return Err(VerificationError::detection(format!(
            "detector output has {} attributes, expected at least 5",
            attributes
        )));
    }

    let value = |attr: usize, pred: usize| {
        if channels_first {
            output[[0, attr, pred]]
        } else {
            output[[0, pred, attr]]
        }
    };

    let mut candidates = Vec::new();
    for i in 0..predictions {
        let confidence = (4..attributes)
            .map(|attr| value(attr, i))
            .fold(f32::NEG_INFINITY, f32::max);

        if !(confidence >= min_confidence) {
            continue;
        }

        let (cx, cy, w, h) = (value(0, i), value(1, i), value(2, i), value(3, i));
        candidates.push(DetectionCandidate::new(
            BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0),
            confidence.min(1.0),
        ));
    }

    Ok(candidates)
}

/// Map detector-space candidates to the source image and suppress overlaps
pub fn finalize_candidates(
    candidates: Vec<DetectionCandidate>,
    info: &PreprocessInfo,
    iou_threshold: f32,
) -> Vec<DetectionCandidate> {
    let mapped = candidates
        .into_iter()
        .map(|c| {
            let (x1, y1) = info.map_to_original(c.bounding_box.x1, c.bounding_box.y1);
            let (x2, y2) = info.map_to_original(c.bounding_box.x2, c.bounding_box.y2);
            DetectionCandidate::new(BoundingBox::new(x1, y1, x2, y2), c.confidence)
        })
        .collect();

    let mut kept = non_max_suppression(mapped, iou_threshold);
    kept.truncate(MAX_DETECTIONS);
    kept
}

/// Greedy non-maximum suppression, highest confidence first
pub fn non_max_suppression(
    mut candidates: Vec<DetectionCandidate>,
    iou_threshold: f32,
) -> Vec<DetectionCandidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<DetectionCandidate> = Vec::new();
    for candidate in candidates {
        let overlaps = keep
            .iter()
            .any(|k| k.bounding_box.iou(&candidate.bounding_box) > iou_threshold);
        if !overlaps {
            keep.push(candidate);
        }
    }

    keep
}
