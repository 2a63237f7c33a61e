//! Per-cohort outcomes and the orchestration report.

use feedline_types::TableRef;
use serde::Serialize;

use crate::errors::{CohortError, PipelineError, Stage};

/// A cohort that made it through fetch, transform and load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortSuccess {
    /// Rows handed to the loader.
    pub rows_loaded: u64,
    /// Rows the destination reports as newly written. Lower than
    /// `rows_loaded` when a replay hit rows that were already present.
    pub rows_written: u64,
    /// Upstream fetch attempts.
    pub attempts: u32,
}

/// Why and where a cohort stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortFailure {
    pub stage: Stage,
    pub attempts: u32,
    pub message: String,
}

impl From<&CohortError> for CohortFailure {
    fn from(e: &CohortError) -> Self {
        Self {
            stage: e.stage(),
            attempts: e.attempts,
            message: e.error.to_string(),
        }
    }
}

/// Result for one cohort of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortOutcome {
    pub cohort: String,
    pub destination: TableRef,
    pub result: Result<CohortSuccess, CohortFailure>,
}

impl CohortOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a run, one per cohort, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestrationReport {
    pub outcomes: Vec<CohortOutcome>,
}

impl OrchestrationReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Total rows newly written across successful cohorts.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|s| s.rows_written)
            .sum()
    }

    /// Outcomes that failed, in input order.
    pub fn failures(&self) -> impl Iterator<Item = &CohortOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Turn any failure into [`PipelineError::CohortsFailed`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CohortsFailed`] listing every failed cohort.
    pub fn into_result(self) -> Result<Self, PipelineError> {
        if self.all_succeeded() {
            return Ok(self);
        }
        Err(PipelineError::CohortsFailed {
            attempted: self.outcomes.len(),
            failures: self.failures().cloned().collect(),
        })
    }
}
