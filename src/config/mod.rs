// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! environment variables. Binaries load `.env` before resolving.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

use crate::vision::{PlateModelConfig, VerificationConfig};

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "ENTRY_SHIELD_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file; gate passes stay in memory when unset
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub storage: StorageConfig,
    pub models: PlateModelConfig,
    pub verification: VerificationConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            storage: StorageConfig::default(),
            models: PlateModelConfig::default(),
            verification: VerificationConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from a TOML file; missing sections keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the full configuration
    ///
    /// `path` wins over `ENTRY_SHIELD_CONFIG`. Environment overrides are
    /// applied last and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);

        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = parse_var(&lookup, "LISTEN_ADDR") {
            self.listen_addr = addr;
        }

        if let Some(val) = lookup("DATABASE_PATH") {
            self.storage.database_path = (!val.trim().is_empty()).then(|| PathBuf::from(val));
        }

        if let Some(val) = lookup("DETECTOR_MODEL_PATH") {
            self.models.detector_model_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("FALLBACK_DETECTOR_MODEL_PATH") {
            self.models.fallback_detector_model_path =
                (!val.trim().is_empty()).then(|| PathBuf::from(val));
        }

        if let Some(val) = lookup("RECOGNIZER_MODEL_PATH") {
            self.models.recognizer_model_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("OCR_DICTIONARY_PATH") {
            self.models.dictionary_path = (!val.trim().is_empty()).then(|| PathBuf::from(val));
        }

        if let Some(threshold) = parse_var(&lookup, "PLATE_CONFIDENCE_THRESHOLD") {
            self.verification.confidence_threshold = threshold;
        }

        if let Some(timeout_ms) = parse_var(&lookup, "VERIFY_TIMEOUT_MS") {
            self.verification.timeout_ms = timeout_ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = 0.0..=1.0;

        if !unit.contains(&self.verification.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "verification.confidence_threshold must be within [0, 1], got {}",
                self.verification.confidence_threshold
            )));
        }

        if !unit.contains(&self.verification.nms_iou_threshold) {
            return Err(ConfigError::Invalid(format!(
                "verification.nms_iou_threshold must be within [0, 1], got {}",
                self.verification.nms_iou_threshold
            )));
        }

        if self.models.languages.is_empty() {
            return Err(ConfigError::Invalid(
                "models.languages must not be empty".to_string(),
            ));
        }

        if self.models.detector_input_size == 0 {
            return Err(ConfigError::Invalid(
                "models.detector_input_size must be greater than 0".to_string(),
            ));
        }

        if self.models.intra_threads == 0 {
            return Err(ConfigError::Invalid(
                "models.intra_threads must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML for `check-config`
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
