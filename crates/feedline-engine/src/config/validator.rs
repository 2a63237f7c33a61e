//! Semantic validation for parsed configuration values.

use std::collections::HashSet;

use anyhow::{bail, Result};
use feedline_sink::identifier::validate_identifier;

use crate::config::types::{FeedlineConfig, WarehouseBackend};
use crate::transform::normalize::column_names;

/// The provider compares at most five keywords per request.
const MAX_KEYWORDS_PER_COHORT: usize = 5;

fn validate_url(url: &str, context: &str, errors: &mut Vec<String>) {
    if url.trim().is_empty() {
        errors.push(format!("{context} must not be empty"));
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("{context} '{url}' must start with http:// or https://"));
    }
}

fn validate_table_part(name: &str, context: &str, errors: &mut Vec<String>) {
    if validate_identifier(name).is_err() {
        errors.push(format!(
            "{context} '{name}' must match [A-Za-z_][A-Za-z0-9_]* (max 63 chars)"
        ));
    }
}

fn validate_trends(config: &FeedlineConfig, errors: &mut Vec<String>) {
    let trends = &config.trends;
    validate_table_part(&trends.dataset, "trends.dataset", errors);

    let mut tables = HashSet::new();
    for cohort in config.trends_cohorts() {
        let context = format!("trends cohort '{}'", cohort.name);
        let suffix = cohort.table_suffix.as_deref().unwrap_or_default();
        let table = format!("{}_{suffix}", trends.table_prefix);
        validate_table_part(&table, &format!("{context} table"), errors);
        if !tables.insert(table.clone()) {
            errors.push(format!("{context} reuses destination table '{table}'"));
        }

        if let feedline_types::CohortKind::Trends { keywords } = &cohort.kind {
            if keywords.is_empty() {
                errors.push(format!("{context} has no keywords"));
            } else if keywords.len() > MAX_KEYWORDS_PER_COHORT {
                errors.push(format!(
                    "{context} has {} keywords, at most {MAX_KEYWORDS_PER_COHORT} are allowed",
                    keywords.len()
                ));
            }
            if let Err(reason) = column_names(keywords) {
                errors.push(format!("{context}: {reason}"));
            }
        }
    }

    let upstream = &config.upstream.trends;
    if !trends.cohorts.is_empty() {
        validate_url(&upstream.base_url, "upstream.trends.base_url", errors);
        if upstream.timeframe.trim().is_empty() {
            errors.push("upstream.trends.timeframe must not be empty".to_string());
        }
        if upstream.tz.is_none() && upstream.timezone.parse::<chrono_tz::Tz>().is_err() {
            errors.push(format!(
                "upstream.trends.timezone '{}' is not a known IANA zone",
                upstream.timezone
            ));
        }
    }
}

/// Validate a parsed configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the config.
pub fn validate_config(config: &FeedlineConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported config version '{}', expected '1.0'",
            config.version
        ));
    }

    if let Some(weather) = &config.upstream.weather {
        validate_url(&weather.base_url, "upstream.weather.base_url", &mut errors);
        if weather.api_key.trim().is_empty() {
            errors.push("upstream.weather.api_key must not be empty".to_string());
        }
    }

    let timeouts = &config.upstream.timeouts;
    if timeouts.connect_secs == 0 {
        errors.push("upstream.timeouts.connect_secs must be > 0".to_string());
    }
    if timeouts.read_secs == 0 {
        errors.push("upstream.timeouts.read_secs must be > 0".to_string());
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        errors.push("retry.max_attempts must be at least 1".to_string());
    }
    if !retry.base_delay_secs.is_finite() || retry.base_delay_secs < 0.0 {
        errors.push("retry.base_delay_secs must be a non-negative number".to_string());
    }
    if !retry.scale_factor.is_finite() || retry.scale_factor < 0.0 {
        errors.push("retry.scale_factor must be a non-negative number".to_string());
    }

    let warehouse = &config.warehouse;
    if warehouse.project.trim().is_empty() {
        errors.push("warehouse.project must not be empty".to_string());
    }
    match warehouse.backend {
        WarehouseBackend::Bigquery => {
            validate_url(&warehouse.bigquery.api_base, "warehouse.bigquery.api_base", &mut errors);
        }
        WarehouseBackend::Postgres => {
            if warehouse.postgres.is_none() {
                errors.push(
                    "warehouse.backend 'postgres' requires a warehouse.postgres section".to_string(),
                );
            }
        }
        WarehouseBackend::Sqlite => {}
    }

    validate_table_part(&config.weather.dataset, "weather.dataset", &mut errors);
    validate_table_part(&config.weather.table, "weather.table", &mut errors);
    validate_trends(config, &mut errors);

    if config.parallelism == 0 {
        errors.push("parallelism must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Config validation failed:\n  - {}", errors.join("\n  - "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_config_str;

    fn valid_yaml() -> &'static str {
        r#"
version: "1.0"
upstream:
  weather:
    base_url: https://api.weather.example/v1/forecast.json
    api_key: abc123
warehouse:
  backend: sqlite
  project: team-god
trends:
  cohorts:
    - keywords: ["fläkt", "jacka", "solglasögon", "solkräm", "badkläder"]
    - keywords: ["varm choklad", "glögg", "earl grey", "chai", "mojito"]
"#
    }

    fn errors_for(yaml: &str) -> String {
        let config = parse_config_str(yaml).unwrap();
        validate_config(&config).unwrap_err().to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config = parse_config_str(valid_yaml()).unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_unknown_trends_timezone_fails() {
        let err = errors_for(&valid_yaml().replace(
            "upstream:\n",
            "upstream:\n  trends:\n    timezone: Mars/Olympus\n",
        ));
        assert!(err.contains("upstream.trends.timezone 'Mars/Olympus'"));
    }

    #[test]
    fn test_wrong_version_fails() {
        let err = errors_for(&valid_yaml().replace("\"1.0\"", "\"2.0\""));
        assert!(err.contains("Unsupported config version"));
    }

    #[test]
    fn test_empty_api_key_fails() {
        let err = errors_for(&valid_yaml().replace("abc123", "\"\""));
        assert!(err.contains("upstream.weather.api_key"));
    }

    #[test]
    fn test_non_http_base_url_fails() {
        let err = errors_for(&valid_yaml().replace("https://api.weather", "ftp://api.weather"));
        assert!(err.contains("upstream.weather.base_url"));
    }

    #[test]
    fn test_postgres_backend_requires_section() {
        let err = errors_for(&valid_yaml().replace("backend: sqlite", "backend: postgres"));
        assert!(err.contains("requires a warehouse.postgres section"));
    }

    #[test]
    fn test_too_many_keywords_fails() {
        let yaml = valid_yaml().replace("\"mojito\"]", "\"mojito\", \"sill\"]");
        let err = errors_for(&yaml);
        assert!(err.contains("trends_2"));
        assert!(err.contains("at most 5"));
    }

    #[test]
    fn test_keywords_clashing_after_normalization_fail() {
        let yaml = valid_yaml().replace("\"jacka\"", "\"flakt\"");
        let err = errors_for(&yaml);
        assert!(err.contains("duplicates column 'flakt'"));
    }

    #[test]
    fn test_duplicate_suffix_fails() {
        let yaml = r#"
version: "1.0"
warehouse:
  backend: sqlite
  project: team-god
trends:
  cohorts:
    - keywords: [glass]
      suffix: "2"
    - keywords: [sill]
"#;
        let err = errors_for(yaml);
        assert!(err.contains("reuses destination table 'searchwords_new_2'"));
    }

    #[test]
    fn test_unsafe_weather_table_fails() {
        let yaml = format!("{}weather:\n  table: raw-weatherapp\n", valid_yaml());
        let err = errors_for(&yaml);
        assert!(err.contains("weather.table"));
    }

    #[test]
    fn test_all_errors_are_reported_together() {
        let yaml = r#"
version: "1.0"
retry:
  max_attempts: 0
  scale_factor: -1
upstream:
  timeouts:
    connect_secs: 0
warehouse:
  backend: sqlite
  project: ""
parallelism: 0
"#;
        let err = errors_for(yaml);
        assert!(err.contains("retry.max_attempts"));
        assert!(err.contains("retry.scale_factor"));
        assert!(err.contains("connect_secs"));
        assert!(err.contains("warehouse.project"));
        assert!(err.contains("parallelism"));
    }
}
