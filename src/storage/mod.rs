// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gate-pass persistence
//!
//! [`GatePassStore`] is the sink the HTTP layer writes to. Two backends:
//! - [`InMemoryGatePassStore`] for development and tests
//! - [`SqliteGatePassStore`] for durable storage in a single file
//!
//! Both enforce a sparse unique constraint on `studentId`: records without
//! one never conflict.

pub mod memory_store;
pub mod sqlite_store;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::gate_pass::{GatePassRecord, GatePassStatus};

pub use memory_store::InMemoryGatePassStore;
pub use sqlite_store::SqliteGatePassStore;

/// Unique field enforced by every store
pub const STUDENT_ID_FIELD: &str = "studentId";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A gate pass with {field} '{value}' already exists")]
    Duplicate { field: &'static str, value: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(format!("serialization failed: {}", e))
    }
}

/// Persistence sink for gate passes
#[async_trait]
pub trait GatePassStore: Send + Sync {
    /// Insert a record, returning its id
    async fn insert(&self, record: GatePassRecord) -> Result<String, StoreError>;

    /// All records, newest submission first
    async fn list(&self) -> Result<Vec<GatePassRecord>, StoreError>;

    /// Set the status of the first record with `receipt_id`; false if none matched
    async fn update_status(&self, receipt_id: &str, status: GatePassStatus) -> Result<bool, StoreError>;

    /// Delete the first record with `receipt_id`; false if none matched
    async fn delete(&self, receipt_id: &str) -> Result<bool, StoreError>;

    /// Backend label for health reporting
    fn name(&self) -> &'static str;
}

/// Open the configured store: SQLite when a path is given, memory otherwise
pub fn open_store(database_path: Option<&Path>) -> anyhow::Result<Arc<dyn GatePassStore>> {
    match database_path {
        Some(path) => Ok(Arc::new(SqliteGatePassStore::open(path)?)),
        None => {
            tracing::warn!("⚠️ No database path configured, gate passes are kept in memory only");
            Ok(Arc::new(InMemoryGatePassStore::new()))
        }
    }
}
