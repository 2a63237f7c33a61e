//! Cohorts and destination table addressing.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::request::SourceKind;

/// Fully-qualified destination table: `<project>.<dataset>.<table>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// Resolve `<prefix>[_<suffix>]` inside `project.dataset`.
    #[must_use]
    pub fn with_suffix(
        project: impl Into<String>,
        dataset: impl Into<String>,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Self {
        let table = match suffix {
            Some(suffix) if !suffix.is_empty() => format!("{prefix}_{suffix}"),
            _ => prefix.to_string(),
        };
        Self::new(project, dataset, table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// What a cohort asks the upstream for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CohortKind {
    /// One location on one forecast day.
    Weather { location: String, date: NaiveDate },
    /// One keyword set compared within a single request.
    Trends { keywords: Vec<String> },
}

/// An independent unit of fetch/transform/load work.
///
/// Each cohort maps to exactly one destination table. A failure in one
/// cohort never affects another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub name: String,
    pub kind: CohortKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_suffix: Option<String>,
}

impl Cohort {
    /// Weather cohort. Weather shares one table, so there is no suffix.
    #[must_use]
    pub fn weather(location: impl Into<String>, date: NaiveDate) -> Self {
        let location = location.into();
        Self {
            name: format!("weather:{location}@{date}"),
            kind: CohortKind::Weather { location, date },
            table_suffix: None,
        }
    }

    /// Trends cohort loaded into `<prefix>_<suffix>`.
    #[must_use]
    pub fn trends(suffix: impl Into<String>, keywords: Vec<String>) -> Self {
        let suffix = suffix.into();
        Self {
            name: format!("trends_{suffix}"),
            kind: CohortKind::Trends { keywords },
            table_suffix: Some(suffix),
        }
    }

    #[must_use]
    pub fn source(&self) -> SourceKind {
        match self.kind {
            CohortKind::Weather { .. } => SourceKind::Weather,
            CohortKind::Trends { .. } => SourceKind::Trends,
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_ref_display_is_dotted() {
        let table = TableRef::new("team-god", "weather_data", "raw_weatherapp");
        assert_eq!(table.to_string(), "team-god.weather_data.raw_weatherapp");
    }

    #[test]
    fn suffix_is_appended_with_underscore() {
        let table = TableRef::with_suffix("p", "google_trends", "searchwords_new", Some("3"));
        assert_eq!(table.table, "searchwords_new_3");

        let shared = TableRef::with_suffix("p", "weather_data", "raw_weatherapp", None);
        assert_eq!(shared.table, "raw_weatherapp");

        let empty = TableRef::with_suffix("p", "d", "t", Some(""));
        assert_eq!(empty.table, "t");
    }

    #[test]
    fn cohort_constructors_set_source_and_suffix() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let weather = Cohort::weather("Stockholm", date);
        assert_eq!(weather.source(), SourceKind::Weather);
        assert!(weather.table_suffix.is_none());
        assert_eq!(weather.name, "weather:Stockholm@2024-06-01");

        let trends = Cohort::trends("2", vec!["glass".into()]);
        assert_eq!(trends.source(), SourceKind::Trends);
        assert_eq!(trends.table_suffix.as_deref(), Some("2"));
        assert_eq!(trends.to_string(), "trends_2");
    }
}
