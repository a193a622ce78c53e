// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Offline plate verification of an image file

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Args;
use std::path::{Path, PathBuf};

use crate::config::ServiceConfig;
use crate::vision::{PlateModelManager, PlateVerifier, VerificationResult};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Photo of the vehicle (PNG, JPEG, WebP, GIF, BMP or TIFF)
    #[arg(long)]
    pub image: PathBuf,

    /// Declared plate to compare against
    #[arg(long)]
    pub plate: Option<String>,

    /// TOML configuration file
    #[arg(long, env = "ENTRY_SHIELD_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Read an image file into the base64 payload the pipeline accepts
pub fn encode_image_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).context(format!("Failed to read image {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

/// Verify one image file with an already-built verifier
pub fn verify_file(
    verifier: &PlateVerifier,
    image: &Path,
    plate: Option<&str>,
) -> Result<VerificationResult> {
    let payload = encode_image_file(image)?;
    Ok(verifier.verify(Some(payload.as_str()), plate))
}

pub async fn run_verify(args: VerifyArgs) -> Result<()> {
    let config = ServiceConfig::load(args.config.as_deref())?;

    let manager = PlateModelManager::load(&config.models, &config.verification);
    let verifier = manager.verifier().ok_or_else(|| {
        anyhow::anyhow!(
            "Plate models not available (detector: {}, recognizer: {})",
            manager.has_detector(),
            manager.has_recognizer()
        )
    })?;

    let image = args.image.clone();
    let plate = args.plate.clone();
    let result = tokio::task::spawn_blocking(move || verify_file(&verifier, &image, plate.as_deref()))
        .await
        .context("Verification task failed")??;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
