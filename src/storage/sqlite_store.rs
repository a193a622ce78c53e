// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! SQLite-backed durable gate-pass store
//!
//! Extra submission fields are kept as a JSON object in the `extra`
//! column. Timestamps are stored as fixed-width RFC 3339 UTC strings so
//! that text ordering equals time ordering.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{ffi, params, Connection, ErrorCode};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use super::{GatePassStore, StoreError, STUDENT_ID_FIELD};
use crate::gate_pass::{GatePassRecord, GatePassStatus};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS gate_passes (
        id                  TEXT PRIMARY KEY,
        receipt_id          TEXT,
        student_id          TEXT,
        vehicle_number      TEXT,
        vehicle_no_photo    TEXT,
        ocr_plate_detected  TEXT NOT NULL,
        plate_match_success INTEGER NOT NULL,
        status              TEXT NOT NULL,
        submitted_at        TEXT NOT NULL,
        extra               TEXT NOT NULL DEFAULT '{}'
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_gate_passes_student
        ON gate_passes(student_id) WHERE student_id IS NOT NULL;
    CREATE INDEX IF NOT EXISTS idx_gate_passes_receipt ON gate_passes(receipt_id);
    CREATE INDEX IF NOT EXISTS idx_gate_passes_submitted ON gate_passes(submitted_at);
";

const SELECT_COLUMNS: &str = "id, receipt_id, student_id, vehicle_number, vehicle_no_photo,
     ocr_plate_detected, plate_match_success, status, submitted_at, extra";

pub struct SqliteGatePassStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGatePassStore {
    /// Create or open a database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context(format!(
            "Failed to open gate-pass database {}",
            path.as_ref().display()
        ))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize gate_passes schema")?;

        info!("✅ SQLite gate-pass store opened at {}", path.as_ref().display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for tests)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize gate_passes schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a database call on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("database task failed: {}", e)))?
    }
}

/// Raw column values of one row
struct StoredRow {
    id: String,
    receipt_id: Option<String>,
    student_id: Option<String>,
    vehicle_number: Option<String>,
    vehicle_no_photo: Option<String>,
    ocr_plate_detected: String,
    plate_match_success: bool,
    status: String,
    submitted_at: String,
    extra: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            receipt_id: row.get(1)?,
            student_id: row.get(2)?,
            vehicle_number: row.get(3)?,
            vehicle_no_photo: row.get(4)?,
            ocr_plate_detected: row.get(5)?,
            plate_match_success: row.get::<_, i64>(6)? != 0,
            status: row.get(7)?,
            submitted_at: row.get(8)?,
            extra: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<GatePassRecord, StoreError> {
        let status: GatePassStatus = self
            .status
            .parse()
            .map_err(|e| StoreError::Backend(format!("row {}: {}", self.id, e)))?;

        let submitted_at = DateTime::parse_from_rfc3339(&self.submitted_at)
            .map_err(|e| StoreError::Backend(format!("row {}: bad timestamp: {}", self.id, e)))?
            .with_timezone(&Utc);

        let extra: Map<String, Value> = serde_json::from_str(&self.extra)?;

        Ok(GatePassRecord {
            id: self.id,
            receipt_id: self.receipt_id,
            student_id: self.student_id,
            vehicle_number: self.vehicle_number,
            vehicle_no_photo: self.vehicle_no_photo,
            ocr_plate_detected: self.ocr_plate_detected,
            plate_match_success: self.plate_match_success,
            status,
            submitted_at,
            extra,
        })
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[async_trait]
impl GatePassStore for SqliteGatePassStore {
    async fn insert(&self, record: GatePassRecord) -> Result<String, StoreError> {
        let extra = serde_json::to_string(&record.extra)?;
        let submitted_at = record
            .submitted_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true);
        let id = record.id.clone();

        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO gate_passes
                   (id, receipt_id, student_id, vehicle_number, vehicle_no_photo,
                    ocr_plate_detected, plate_match_success, status, submitted_at, extra)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    record.receipt_id,
                    record.student_id,
                    record.vehicle_number,
                    record.vehicle_no_photo,
                    record.ocr_plate_detected,
                    record.plate_match_success as i64,
                    record.status.as_str(),
                    submitted_at,
                    extra,
                ],
            );

            match inserted {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => {
                    debug!("Rejecting duplicate studentId {:?}", record.student_id);
                    Err(StoreError::Duplicate {
                        field: STUDENT_ID_FIELD,
                        value: record.student_id.unwrap_or_default(),
                    })
                }
                Err(e) => Err(e.into()),
            }
        })
        .await?;

        info!("✅ Gate pass {} stored", id);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<GatePassRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM gate_passes ORDER BY submitted_at DESC, rowid DESC",
                SELECT_COLUMNS
            ))?;

            let rows = stmt
                .query_map([], StoredRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter().map(StoredRow::into_record).collect()
        })
        .await
    }

    async fn update_status(&self, receipt_id: &str, status: GatePassStatus) -> Result<bool, StoreError> {
        let receipt = receipt_id.to_string();
        let changed = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    "UPDATE gate_passes SET status = ?1
                     WHERE rowid = (SELECT rowid FROM gate_passes WHERE receipt_id = ?2 ORDER BY rowid LIMIT 1)",
                    params![status.as_str(), receipt],
                )?)
            })
            .await?;

        if changed > 0 {
            info!("Gate pass {} status set to {}", receipt_id, status);
        } else {
            debug!("No gate pass with receipt {}", receipt_id);
        }
        Ok(changed > 0)
    }

    async fn delete(&self, receipt_id: &str) -> Result<bool, StoreError> {
        let receipt = receipt_id.to_string();
        let deleted = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM gate_passes
                     WHERE rowid = (SELECT rowid FROM gate_passes WHERE receipt_id = ?1 ORDER BY rowid LIMIT 1)",
                    params![receipt],
                )?)
            })
            .await?;

        if deleted > 0 {
            info!("🗑️ Gate pass {} deleted", receipt_id);
        } else {
            debug!("No gate pass with receipt {}", receipt_id);
        }
        Ok(deleted > 0)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
