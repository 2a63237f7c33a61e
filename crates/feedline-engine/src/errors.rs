//! Pipeline error model.

use std::fmt;

use feedline_types::{LoadError, TransformError, UpstreamError};
use serde::Serialize;

use crate::result::CohortOutcome;
use crate::retry::RetryError;

/// Stage of the fetch-transform-load sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Transform,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Transform => f.write_str("transform"),
            Self::Load => f.write_str("load"),
        }
    }
}

/// Typed failure of a single stage.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Fetch(#[from] RetryError<UpstreamError>),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl StageError {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Fetch(_) => Stage::Fetch,
            Self::Transform(_) => Stage::Transform,
            Self::Load(_) => Stage::Load,
        }
    }
}

/// One cohort failed.
///
/// `attempts` counts upstream fetch attempts, including those made before a
/// later stage failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cohort '{cohort}' failed at {} after {attempts} attempt(s): {error}", .error.stage())]
pub struct CohortError {
    pub cohort: String,
    pub attempts: u32,
    pub error: StageError,
}

impl CohortError {
    #[must_use]
    pub fn new(cohort: impl Into<String>, attempts: u32, error: impl Into<StageError>) -> Self {
        Self {
            cohort: cohort.into(),
            attempts,
            error: error.into(),
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.error.stage()
    }
}

/// Engine-level error.
///
/// `Cohort` and `CohortsFailed` are typed pipeline outcomes. `Infrastructure`
/// wraps host-side failures (config, file IO, destination setup) that happen
/// before any cohort runs.
#[derive(Debug)]
pub enum PipelineError {
    /// A single-cohort run failed.
    Cohort(CohortError),
    /// At least one cohort of a multi-cohort run failed. All cohorts were
    /// attempted.
    CohortsFailed {
        attempted: usize,
        failures: Vec<CohortOutcome>,
    },
    /// Infrastructure error (configuration, IO, destination setup, etc.)
    Infrastructure(anyhow::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cohort(e) => write!(f, "{e}"),
            Self::CohortsFailed {
                attempted,
                failures,
            } => {
                write!(f, "{} of {attempted} cohort(s) failed", failures.len())?;
                for outcome in failures {
                    if let Err(failure) = &outcome.result {
                        write!(
                            f,
                            "; {} [{}]: {}",
                            outcome.cohort, failure.stage, failure.message
                        )?;
                    }
                }
                Ok(())
            }
            Self::Infrastructure(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        Self::Infrastructure(e)
    }
}

impl From<CohortError> for PipelineError {
    fn from(e: CohortError) -> Self {
        Self::Cohort(e)
    }
}

impl PipelineError {
    /// Names of the cohorts that failed, if this is a cohort error.
    #[must_use]
    pub fn failed_cohorts(&self) -> Vec<&str> {
        match self {
            Self::Cohort(e) => vec![e.cohort.as_str()],
            Self::CohortsFailed { failures, .. } => {
                failures.iter().map(|o| o.cohort.as_str()).collect()
            }
            Self::Infrastructure(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedline_types::TableRef;

    #[test]
    fn stage_error_reports_its_stage() {
        let fetch = StageError::from(RetryError::Exhausted {
            attempts: 10,
            last_error: UpstreamError::timeout("read timed out"),
        });
        assert_eq!(fetch.stage(), Stage::Fetch);

        let transform = StageError::from(TransformError::missing("location.localtime"));
        assert_eq!(transform.stage(), Stage::Transform);

        let load = StageError::from(LoadError::batch(TableRef::new("p", "d", "t"), 3, "denied"));
        assert_eq!(load.stage(), Stage::Load);
    }

    #[test]
    fn cohort_error_display_has_context() {
        let err = CohortError::new(
            "trends_2",
            10,
            RetryError::Exhausted {
                attempts: 10,
                last_error: UpstreamError::http(503, "unavailable"),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("trends_2"));
        assert!(msg.contains("fetch"));
        assert!(msg.contains("10 attempt(s)"));
        assert!(msg.contains("[http_503] unavailable"));
    }

    #[test]
    fn pipeline_error_from_anyhow() {
        let pe: PipelineError = anyhow::anyhow!("config missing").into();
        assert!(matches!(pe, PipelineError::Infrastructure(_)));
        assert!(pe.failed_cohorts().is_empty());
        assert!(pe.to_string().contains("config missing"));
    }

    #[test]
    fn pipeline_error_from_cohort_error() {
        let pe: PipelineError =
            CohortError::new("weather:Stockholm@2024-06-01", 1, TransformError::missing("hour"))
                .into();
        assert_eq!(pe.failed_cohorts(), vec!["weather:Stockholm@2024-06-01"]);
    }
}
