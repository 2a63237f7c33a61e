//! Structured error model for the fetch, transform and load stages.
//!
//! [`UpstreamError`] carries a classification that decides retry behavior.
//! [`TransformError`] and [`LoadError`] are permanent for the current cycle.
//! Construct via the stage-specific factory methods.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cohort::TableRef;

/// Broad classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamErrorKind {
    /// Connect or read budget elapsed.
    Timeout,
    /// Connection could not be established or was reset.
    Connect,
    /// Provider answered with a non-2xx status.
    HttpError { status: u16 },
    /// Body was not the structured document we expected.
    ParseError,
    /// No client is configured for the requested source.
    Unsupported,
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Connect => f.write_str("connect"),
            Self::HttpError { status } => write!(f, "http_{status}"),
            Self::ParseError => f.write_str("parse"),
            Self::Unsupported => f.write_str("unsupported"),
        }
    }
}

/// Failure of a single upstream fetch.
///
/// Messages must never embed request URLs: weather URLs carry the API key
/// in the query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{kind}] {message}")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Connect or read timeout (retryable).
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Timeout, message)
    }

    /// Connection refused or reset (retryable).
    #[must_use]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Connect, message)
    }

    /// Non-2xx response. Retryable for 408, 429 and 5xx only.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::HttpError { status }, message)
    }

    /// Malformed or truncated body (retryable: providers under load return
    /// HTML throttling pages and cut-off documents).
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::ParseError, message)
    }

    /// Source has no configured client (not retryable).
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Unsupported, message)
    }

    /// Whether another attempt could plausibly succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            UpstreamErrorKind::Timeout
            | UpstreamErrorKind::Connect
            | UpstreamErrorKind::ParseError => true,
            UpstreamErrorKind::HttpError { status } => {
                status == 408 || status == 429 || (500..600).contains(&status)
            }
            UpstreamErrorKind::Unsupported => false,
        }
    }
}

/// A required payload field was absent or unparseable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("transform failed on field '{field}': {reason}")]
pub struct TransformError {
    pub field: String,
    pub reason: String,
}

impl TransformError {
    /// Field is missing entirely.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: "missing".to_string(),
        }
    }

    /// Field is present but has the wrong shape or cannot be parsed.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// The destination rejected the batch, or part of it.
///
/// `rows_written` may be non-zero: the warehouse gives no partial
/// acknowledgment contract, so any rejection fails the whole call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("load into {destination} failed with {} error(s): {}", .errors.len(), summarize(.errors))]
pub struct LoadError {
    pub destination: TableRef,
    pub errors: Vec<String>,
    pub rows_attempted: u64,
    pub rows_written: u64,
}

impl LoadError {
    /// Batch-level failure: nothing is known to have been written.
    #[must_use]
    pub fn batch(destination: TableRef, rows_attempted: u64, error: impl Into<String>) -> Self {
        Self {
            destination,
            errors: vec![error.into()],
            rows_attempted,
            rows_written: 0,
        }
    }
}

const SUMMARY_LIMIT: usize = 3;

fn summarize(errors: &[String]) -> String {
    let mut shown = errors
        .iter()
        .take(SUMMARY_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");
    if errors.len() > SUMMARY_LIMIT {
        shown.push_str(&format!("; (+{} more)", errors.len() - SUMMARY_LIMIT));
    }
    shown
}
