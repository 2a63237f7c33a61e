//! Fetch-transform-load engine for feedline.
//!
//! Wires upstream clients, the retry executor, record transforms and batch
//! loaders into per-cohort pipeline runs.

pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod resolve;
pub mod result;
pub mod retry;
pub mod transform;
pub mod trigger;

// Re-export public API for convenience
pub use errors::{CohortError, PipelineError, Stage, StageError};
pub use orchestrator::{CohortRun, Destinations, Orchestrator, TrendsParams};
pub use result::{CohortFailure, CohortOutcome, CohortSuccess, OrchestrationReport};
pub use retry::{with_retry, Retried, RetryError, RetryPolicy, Retryable};
pub use trigger::{Redactor, Trigger, TriggerFailure};
