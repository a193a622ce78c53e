// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Plate text normalization and tolerant matching

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator characters printed on plates or typed by users
const PLATE_SEPARATORS: &[char] = &['-', '.'];

/// Plate text in canonical form: uppercase, no whitespace, no separators
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPlate(String);

impl NormalizedPlate {
    /// Normalize raw plate text; `None` yields the empty plate
    pub fn new(raw: Option<&str>) -> Self {
        let canonical = raw
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace() && !PLATE_SEPARATORS.contains(c))
            .flat_map(char::to_uppercase)
            .collect();
        Self(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Tolerant comparison against a declared plate
    ///
    /// Both sides must be non-empty; either may contain the other. OCR often
    /// drops or adds a state prefix or picks up a dealer frame.
    pub fn matches(&self, declared: &NormalizedPlate) -> bool {
        !self.is_empty()
            && !declared.is_empty()
            && (self.0.contains(declared.as_str()) || declared.0.contains(self.as_str()))
    }
}

impl fmt::Display for NormalizedPlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NormalizedPlate {
    fn from(raw: &str) -> Self {
        Self::new(Some(raw))
    }
}

/// Normalize optional plate text to its canonical string form
pub fn normalize_plate(raw: Option<&str>) -> String {
    NormalizedPlate::new(raw).into_string()
}

/// Tolerant match of two raw plate strings
pub fn plates_match(detected: &str, declared: &str) -> bool {
    NormalizedPlate::from(detected).matches(&NormalizedPlate::from(declared))
}
