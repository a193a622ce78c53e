// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory gate-pass store

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{GatePassStore, StoreError, STUDENT_ID_FIELD};
use crate::gate_pass::{GatePassRecord, GatePassStatus};

/// Gate passes held in process memory, lost on restart
#[derive(Clone, Default)]
pub struct InMemoryGatePassStore {
    records: Arc<RwLock<Vec<GatePassRecord>>>,
}

impl InMemoryGatePassStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl GatePassStore for InMemoryGatePassStore {
    async fn insert(&self, record: GatePassRecord) -> Result<String, StoreError> {
        let mut records = self.records.write().await;

        if let Some(student_id) = &record.student_id {
            if records
                .iter()
                .any(|r| r.student_id.as_deref() == Some(student_id.as_str()))
            {
                debug!("Rejecting duplicate studentId {}", student_id);
                return Err(StoreError::Duplicate {
                    field: STUDENT_ID_FIELD,
                    value: student_id.clone(),
                });
            }
        }

        let id = record.id.clone();
        records.push(record);

        info!("✅ Gate pass {} stored ({} total)", id, records.len());
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<GatePassRecord>, StoreError> {
        let records = self.records.read().await;

        // Reverse first so equal timestamps list the later insert first
        let mut listed: Vec<GatePassRecord> = records.iter().rev().cloned().collect();
        listed.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(listed)
    }

    async fn update_status(&self, receipt_id: &str, status: GatePassStatus) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;

        match records
            .iter_mut()
            .find(|r| r.receipt_id.as_deref() == Some(receipt_id))
        {
            Some(record) => {
                record.status = status;
                info!("Gate pass {} status set to {}", receipt_id, status);
                Ok(true)
            }
            None => {
                debug!("No gate pass with receipt {}", receipt_id);
                Ok(false)
            }
        }
    }

    async fn delete(&self, receipt_id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;

        match records
            .iter()
            .position(|r| r.receipt_id.as_deref() == Some(receipt_id))
        {
            Some(index) => {
                records.remove(index);
                info!("🗑️ Gate pass {} deleted", receipt_id);
                Ok(true)
            }
            None => {
                debug!("No gate pass with receipt {}", receipt_id);
                Ok(false)
            }
        }
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
