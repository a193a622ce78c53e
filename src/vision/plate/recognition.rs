// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Plate text recognition
//!
//! [`TextRecognizer`] is the recognition capability the verifier depends
//! on. [`OnnxPlateRecognizer`] implements it with a CTC recognition model
//! (PaddleOCR-style `[1, T, C]` output) running on CPU.

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{ArrayViewD, IxDyn};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::detection::lock_session;
use super::error::VerificationError;
use super::preprocessing::preprocess_for_recognition;

/// Languages the recognizer can read
pub const SUPPORTED_LANGUAGES: &[&str] = &["en"];

/// Characters of the built-in English plate vocabulary
pub const ENGLISH_PLATE_CHARSET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Recognized text with confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    /// The recognized text content
    pub text: String,
    /// Overall confidence score (0.0-1.0)
    pub confidence: f32,
    /// Per-character confidences (if available)
    pub char_confidences: Vec<f32>,
}

impl RecognizedText {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            char_confidences: Vec::new(),
        }
    }

    /// Check if the text is empty or whitespace only
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Recognizer capability: plate crop in, zero or more text readings out
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, region: &RgbImage) -> Result<Vec<RecognizedText>, VerificationError>;

    /// Recognizer name for logging
    fn name(&self) -> &'static str;
}

/// Run the recognizer and keep its single best reading
///
/// Blank readings are discarded. The highest-confidence reading wins; on
/// a tie the one reported first is kept. `Ok(None)` means nothing legible.
pub fn extract_text(
    recognizer: &dyn TextRecognizer,
    region: &RgbImage,
) -> Result<Option<RecognizedText>, VerificationError> {
    if region.width() == 0 || region.height() == 0 {
        return Err(VerificationError::recognition("region has zero area"));
    }

    let readings = recognizer.recognize(region)?;

    let mut best: Option<RecognizedText> = None;
    for reading in readings.into_iter().filter(|r| !r.is_empty()) {
        match &best {
            Some(current) if reading.confidence <= current.confidence => {}
            _ => best = Some(reading),
        }
    }

    Ok(best)
}

/// CTC plate recognizer backed by ONNX Runtime
#[derive(Clone)]
pub struct OnnxPlateRecognizer {
    /// ONNX Runtime session (one inference at a time)
    session: Arc<Mutex<Session>>,
    /// Character dictionary for CTC decoding; index 0 is the blank token
    dictionary: Arc<Vec<char>>,
    /// Model input name
    input_name: String,
    /// Model output name
    output_name: String,
    /// File the model was loaded from
    model_path: PathBuf,
}

impl std::fmt::Debug for OnnxPlateRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPlateRecognizer")
            .field("dictionary_size", &self.dictionary.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .finish_non_exhaustive()
    }
}

impl OnnxPlateRecognizer {
    /// Load the recognition model
    ///
    /// `dict_path` overrides the built-in English vocabulary. `languages`
    /// must be exactly `["en"]`.
    ///
    /// # Errors
    /// Returns error if:
    /// - An unsupported language is requested
    /// - Model or dictionary file not found
    /// - ONNX Runtime initialization fails
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        dict_path: Option<&Path>,
        languages: &[String],
        intra_threads: usize,
    ) -> Result<Self> {
        validate_languages(languages)?;

        let model_path = model_path.as_ref();
        if !model_path.exists() {
            anyhow::bail!(
                "Plate recognition model not found: {}",
                model_path.display()
            );
        }

        let dictionary = match dict_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Dictionary file not found: {}", path.display());
                }
                Self::load_dictionary(path)?
            }
            None => builtin_dictionary(),
        };

        info!(
            "Loading plate recognition model from {} ({} classes)",
            model_path.display(),
            dictionary.len()
        );

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
                "Failed to load plate recognition model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .unwrap_or_else(|| "output".to_string());

        info!("✅ Plate recognition model loaded (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            dictionary: Arc::new(dictionary),
            input_name,
            output_name,
            model_path: model_path.to_path_buf(),
        })
    }

    /// Load character dictionary from file
    ///
    /// One character per line, in model class order starting at index 1.
    /// A trailing space class is appended, as PaddleOCR exports expect.
    fn load_dictionary<P: AsRef<Path>>(path: P) -> Result<Vec<char>> {
        let file = File::open(path.as_ref()).context(format!(
            "Failed to open dictionary: {}",
            path.as_ref().display()
        ))?;

        let reader = BufReader::new(file);
        let mut dictionary = vec![' ']; // Index 0 is blank token for CTC

        for line in reader.lines() {
            let line = line.context("Failed to read dictionary line")?;
            if let Some(ch) = line.chars().next() {
                dictionary.push(ch);
            }
        }

        dictionary.push(' ');
        Ok(dictionary)
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl TextRecognizer for OnnxPlateRecognizer {
    fn recognize(&self, region: &RgbImage) -> Result<Vec<RecognizedText>, VerificationError> {
        let input = preprocess_for_recognition(region);

        let mut session = lock_session(&*self.session, self.name());

        let input_value = Value::from_array(input).map_err(|e| {
            VerificationError::recognition(format!("Failed to create input tensor: {}", e))
        })?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| VerificationError::recognition(format!("Recognition inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            VerificationError::recognition(format!("Model produced no '{}' output", self.output_name))
        })?;

        let output_tensor = output.try_extract_array::<f32>().map_err(|e| {
            VerificationError::recognition(format!("Failed to extract output tensor: {}", e))
        })?;

        debug!("Recognition output shape: {:?}", output_tensor.shape());

        let reading = ctc_greedy_decode(output_tensor.view(), &self.dictionary)?;
        if reading.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![reading])
        }
    }

    fn name(&self) -> &'static str {
        "ctc-onnx"
    }
}

/// Check a requested language list against [`SUPPORTED_LANGUAGES`]
pub fn validate_languages(languages: &[String]) -> Result<()> {
    let supported = languages.len() == SUPPORTED_LANGUAGES.len()
        && languages
            .iter()
            .zip(SUPPORTED_LANGUAGES)
            .all(|(requested, supported)| requested == supported);

    if !supported {
        anyhow::bail!(
            "Unsupported recognition languages {:?}, expected {:?}",
            languages,
            SUPPORTED_LANGUAGES
        );
    }

    Ok(())
}

/// Blank token followed by digits and capital letters
pub fn builtin_dictionary() -> Vec<char> {
    std::iter::once(' ')
        .chain(ENGLISH_PLATE_CHARSET.chars())
        .collect()
}

/// CTC greedy (best path) decoding
///
/// Accepts `[1, T, C]` or `[T, C]`. Repeated classes collapse unless a
/// blank (index 0) separates them. Classes beyond the dictionary are
/// dropped.
pub fn ctc_greedy_decode(
    output: ArrayViewD<f32>,
    dictionary: &[char],
) -> Result<RecognizedText, VerificationError> {
    let output_shape = output.shape();

    let (seq_len, num_classes) = match output_shape {
        [1, t, c] => (*t, *c),
        [t, c] => (*t, *c),
        _ => {
            return Err(VerificationError::recognition(format!(
                "Unexpected output shape: {:?}",
                output_shape
            )))
        }
    };
    let batched = output_shape.len() == 3;

    let mut text = String::new();
    let mut char_confidences = Vec::new();
    let mut prev_index: Option<usize> = None;

    for t in 0..seq_len {
        let mut max_prob = f32::NEG_INFINITY;
        let mut max_index = 0usize;

        for c in 0..num_classes {
            let prob = if batched {
                output[IxDyn(&[0, t, c])]
            } else {
                output[IxDyn(&[t, c])]
            };

            if prob > max_prob {
                max_prob = prob;
                max_index = c;
            }
        }

        if max_index != 0 && Some(max_index) != prev_index {
            if let Some(&ch) = dictionary.get(max_index) {
                text.push(ch);
                char_confidences.push(max_prob);
            }
        }

        prev_index = if max_index == 0 { None } else { Some(max_index) };
    }

    let avg_confidence = if char_confidences.is_empty() {
        0.0
    } else {
        char_confidences.iter().sum::<f32>() / char_confidences.len() as f32
    };

    // Log-probabilities squash through a sigmoid
    let confidence = if avg_confidence < 0.0 {
        1.0 / (1.0 + (-avg_confidence).exp())
    } else {
        avg_confidence.min(1.0)
    };

    Ok(RecognizedText {
        text,
        confidence,
        char_confidences,
    })
}
