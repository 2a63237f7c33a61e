//! Batch load accounting.

use serde::{Deserialize, Serialize};

use crate::cohort::TableRef;
use crate::error::LoadError;

/// A single row the destination refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRejection {
    /// Position of the row in the submitted batch.
    pub index: usize,
    pub row_id: Option<i64>,
    pub reason: String,
}

/// Outcome of one `load` call against one destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResult {
    pub destination: TableRef,
    pub rows_attempted: u64,
    /// Rows actually appended. Lower than `rows_attempted` when a
    /// de-duplicating destination skipped already-present `row_id`s.
    pub rows_written: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<RowRejection>,
}

impl LoadResult {
    /// Result of loading an empty batch: nothing attempted, nothing contacted.
    #[must_use]
    pub fn empty(destination: TableRef) -> Self {
        Self {
            destination,
            rows_attempted: 0,
            rows_written: 0,
            rejections: Vec::new(),
        }
    }

    #[must_use]
    pub fn rows_rejected(&self) -> u64 {
        self.rejections.len() as u64
    }

    /// Rows neither written nor rejected (duplicates the destination skipped).
    #[must_use]
    pub fn rows_skipped(&self) -> u64 {
        self.rows_attempted
            .saturating_sub(self.rows_written)
            .saturating_sub(self.rows_rejected())
    }

    /// Convert into the load contract: any rejection fails the whole call.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] listing every rejection when at least one row
    /// was refused.
    pub fn into_outcome(self) -> Result<Self, LoadError> {
        if self.rejections.is_empty() {
            return Ok(self);
        }
        Err(LoadError {
            errors: self
                .rejections
                .iter()
                .map(|r| match r.row_id {
                    Some(id) => format!("row {} (row_id {id}): {}", r.index, r.reason),
                    None => format!("row {}: {}", r.index, r.reason),
                })
                .collect(),
            destination: self.destination,
            rows_attempted: self.rows_attempted,
            rows_written: self.rows_written,
        })
    }
}
