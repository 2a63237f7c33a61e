//! Immutable upstream fetch requests.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Connect timeout used when nothing else is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Overall read budget used when nothing else is configured.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(100);

/// Which provider a request or payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Weather,
    Trends,
}

impl SourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Trends => "trends",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Separate connect and read budgets. Providers respond slowly under load,
/// so the read budget is much larger than the connect budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Interest-over-time query for a single keyword set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendsQuery {
    pub keywords: Vec<String>,
    /// Provider timeframe expression, e.g. `"today 3-m"`.
    pub timeframe: String,
    /// Region code, e.g. `"SE-AB"`.
    pub geo: String,
    /// `0` means all categories.
    pub category: u32,
    /// Search property; empty string means web search.
    pub property: String,
}

/// Provider-specific query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum QueryParams {
    Weather { location: String, date: NaiveDate },
    Trends(TrendsQuery),
}

/// A fully-specified upstream request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    params: QueryParams,
    timeouts: Timeouts,
}

impl FetchRequest {
    #[must_use]
    pub fn weather(location: impl Into<String>, date: NaiveDate, timeouts: Timeouts) -> Self {
        Self {
            params: QueryParams::Weather {
                location: location.into(),
                date,
            },
            timeouts,
        }
    }

    #[must_use]
    pub fn trends(query: TrendsQuery, timeouts: Timeouts) -> Self {
        Self {
            params: QueryParams::Trends(query),
            timeouts,
        }
    }

    #[must_use]
    pub fn source(&self) -> SourceKind {
        match self.params {
            QueryParams::Weather { .. } => SourceKind::Weather,
            QueryParams::Trends(_) => SourceKind::Trends,
        }
    }

    #[must_use]
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}
