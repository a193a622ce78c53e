// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod gate_pass;
pub mod storage;
pub mod version;
pub mod vision;

// Re-export commonly used types
pub use api::{create_router, AppState};
pub use config::{ConfigError, ServiceConfig};
pub use gate_pass::{GatePassRecord, GatePassStatus, NewGatePass};
pub use storage::{GatePassStore, InMemoryGatePassStore, SqliteGatePassStore, StoreError};
pub use vision::{PlateModelManager, PlateVerifier, VerificationResult, VerifierConfig};
