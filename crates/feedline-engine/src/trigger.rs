//! Caller-facing entry points: weather ingestion, trends run and payload load.
//!
//! Every failure is converted to a [`TriggerFailure`] with status 500 and a
//! detail string from which configured secrets have been masked.

use chrono::NaiveDate;
use feedline_types::{Cohort, LoadResult, RawPayload, SourceKind, WarehouseRow};
use serde_json::Value;

use crate::config::FeedlineConfig;
use crate::errors::PipelineError;
use crate::orchestrator::Orchestrator;
use crate::resolve::{build_loader, build_upstream};
use crate::result::OrchestrationReport;

const MASK: &str = "***";

/// Caller-facing failure, shaped like an HTTP error response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status}: {detail}")]
pub struct TriggerFailure {
    pub status: u16,
    pub detail: String,
}

impl TriggerFailure {
    fn internal(detail: String) -> Self {
        Self {
            status: 500,
            detail,
        }
    }
}

/// Masks secrets in text leaving the process.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    /// Longer secrets are masked first so that a secret containing another
    /// is replaced whole.
    #[must_use]
    pub fn new(secrets: impl IntoIterator<Item = String>) -> Self {
        let mut secrets: Vec<String> = secrets.into_iter().filter(|s| !s.is_empty()).collect();
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        secrets.dedup();
        Self { secrets }
    }

    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), MASK))
    }
}

/// Process-wide handles for the entry points.
pub struct Trigger {
    orchestrator: Orchestrator,
    redactor: Redactor,
    trends_cohorts: Vec<Cohort>,
}

impl Trigger {
    #[must_use]
    pub fn new(orchestrator: Orchestrator, redactor: Redactor, trends_cohorts: Vec<Cohort>) -> Self {
        Self {
            orchestrator,
            redactor,
            trends_cohorts,
        }
    }

    /// Build upstream and destination handles from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Infrastructure`] if either handle cannot be
    /// built.
    pub async fn from_config(config: &FeedlineConfig) -> Result<Self, PipelineError> {
        let upstream = build_upstream(config)?;
        let loader = build_loader(config).await?;
        Ok(Self::new(
            Orchestrator::from_config(config, upstream, loader),
            Redactor::new(config.secrets()),
            config.trends_cohorts(),
        ))
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    fn fail(&self, err: &PipelineError) -> TriggerFailure {
        let detail = self.redactor.redact(&err.to_string());
        tracing::error!(failed = ?err.failed_cohorts(), "{detail}");
        TriggerFailure::internal(detail)
    }

    /// Fetch, transform and load one location's forecast day.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerFailure`] if any stage fails.
    pub async fn ingest_weather(
        &self,
        location: &str,
        date: NaiveDate,
    ) -> Result<Vec<WarehouseRow>, TriggerFailure> {
        let cohort = Cohort::weather(location, date);
        self.orchestrator
            .execute(&cohort)
            .await
            .map(|run| run.rows)
            .map_err(|e| self.fail(&PipelineError::from(e)))
    }

    /// Run every configured trends cohort.
    ///
    /// All cohorts are attempted even when some fail.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerFailure`] aggregating every failed cohort.
    pub async fn run_trends(&self) -> Result<OrchestrationReport, TriggerFailure> {
        self.orchestrator
            .run_all(&self.trends_cohorts)
            .await
            .into_result()
            .map_err(|e| self.fail(&e))
    }

    /// Transform and load a weather document fetched by the caller.
    ///
    /// Accepts the raw provider shape or `{location, hour}`.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerFailure`] if the document is malformed or the
    /// destination rejects the batch.
    pub async fn load_weather_payload(&self, body: Value) -> Result<LoadResult, TriggerFailure> {
        let payload = RawPayload::new(SourceKind::Weather, body);
        let destination = self.orchestrator.destinations().weather();
        self.orchestrator
            .load_payload(&payload, &destination)
            .await
            .map_err(|e| {
                let detail = self.redactor.redact(&e.to_string());
                tracing::error!(destination = %destination, stage = %e.stage(), "{detail}");
                TriggerFailure::internal(detail)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_every_secret() {
        let redactor = Redactor::new(vec!["abc123".to_string(), "ya29.tok".to_string()]);
        assert_eq!(
            redactor.redact("key=abc123 token=ya29.tok again abc123"),
            "key=*** token=*** again ***"
        );
    }

    #[test]
    fn longer_secret_wins_over_contained_one() {
        let redactor = Redactor::new(vec!["abc".to_string(), "abc123".to_string()]);
        assert_eq!(redactor.redact("abc123 abc"), "*** ***");
    }

    #[test]
    fn empty_secrets_are_ignored() {
        let redactor = Redactor::new(vec![String::new()]);
        assert_eq!(redactor.redact("nothing to hide"), "nothing to hide");
    }

    #[test]
    fn trigger_failure_display() {
        let failure = TriggerFailure::internal("fetch failed".into());
        assert_eq!(failure.status, 500);
        assert_eq!(failure.to_string(), "500: fetch failed");
    }
}
