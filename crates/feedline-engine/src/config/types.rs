use std::time::Duration;

use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use feedline_sink::PostgresConfig;
use feedline_types::{Cohort, Timeouts};
use serde::Deserialize;

use crate::retry::RetryPolicy;

pub const DEFAULT_TRENDS_BASE_URL: &str = "https://trends.google.com";
pub const DEFAULT_BIGQUERY_API_BASE: &str = feedline_sink::bigquery::DEFAULT_API_BASE;

/// Top-level `feedline.yaml` document.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedlineConfig {
    pub version: String,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub weather: WeatherTableConfig,
    #[serde(default)]
    pub trends: TrendsTableConfig,
    /// Cohorts run concurrently within one trigger. `1` runs them in order.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    /// Extra strings to mask in caller-facing error details.
    #[serde(default)]
    pub redact: Vec<String>,
}

fn default_parallelism() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamConfig {
    pub weather: Option<WeatherUpstreamConfig>,
    #[serde(default)]
    pub trends: TrendsUpstreamConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Clone, Deserialize)]
pub struct WeatherUpstreamConfig {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for WeatherUpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherUpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

/// Provider settings for interest-over-time requests.
#[derive(Debug, Clone, Deserialize)]
pub struct TrendsUpstreamConfig {
    #[serde(default = "default_trends_base_url")]
    pub base_url: String,
    #[serde(default = "default_hl")]
    pub hl: String,
    /// IANA zone whose current UTC offset is sent as `tz`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Fixed offset in minutes; overrides `timezone` when set.
    #[serde(default)]
    pub tz: Option<i32>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_geo")]
    pub geo: String,
    #[serde(default)]
    pub category: u32,
    #[serde(default)]
    pub property: String,
}

fn default_trends_base_url() -> String {
    DEFAULT_TRENDS_BASE_URL.to_string()
}
fn default_hl() -> String {
    "sv".to_string()
}
fn default_timezone() -> String {
    "Europe/Stockholm".to_string()
}
fn default_timeframe() -> String {
    "today 3-m".to_string()
}
fn default_geo() -> String {
    "SE-AB".to_string()
}

impl Default for TrendsUpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_trends_base_url(),
            hl: default_hl(),
            timezone: default_timezone(),
            tz: None,
            timeframe: default_timeframe(),
            geo: default_geo(),
            category: 0,
            property: String::new(),
        }
    }
}

impl TrendsUpstreamConfig {
    /// UTC offset in minutes at `now`, following daylight saving of
    /// `timezone` unless a fixed `tz` is configured.
    ///
    /// Returns `None` if `timezone` is not a known IANA zone.
    #[must_use]
    pub fn tz_offset_at(&self, now: DateTime<Utc>) -> Option<i32> {
        if let Some(fixed) = self.tz {
            return Some(fixed);
        }
        let zone: Tz = self.timezone.parse().ok()?;
        let offset = zone.offset_from_utc_datetime(&now.naive_utc()).fix();
        Some(offset.local_minus_utc() / 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_read_secs")]
    pub read_secs: u64,
}

fn default_connect_secs() -> u64 {
    30
}
fn default_read_secs() -> u64 {
    100
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            read_secs: default_read_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
}

fn default_max_attempts() -> u32 {
    10
}
fn default_base_delay_secs() -> f64 {
    60.0
}
fn default_scale_factor() -> f64 {
    0.25
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            scale_factor: default_scale_factor(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseBackend {
    Bigquery,
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    pub backend: WarehouseBackend,
    pub project: String,
    #[serde(default)]
    pub bigquery: BigQueryConfig,
    pub postgres: Option<PostgresConfig>,
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

#[derive(Clone, Deserialize)]
pub struct BigQueryConfig {
    #[serde(default = "default_bigquery_api_base")]
    pub api_base: String,
    /// Pre-provisioned bearer token.
    pub access_token: Option<String>,
}

fn default_bigquery_api_base() -> String {
    DEFAULT_BIGQUERY_API_BASE.to_string()
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            api_base: default_bigquery_api_base(),
            access_token: None,
        }
    }
}

impl std::fmt::Debug for BigQueryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryConfig")
            .field("api_base", &self.api_base)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SqliteConfig {
    /// Database file. Defaults to `~/.feedline/warehouse.db`.
    pub path: Option<String>,
}

/// Destination of weather rows.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherTableConfig {
    #[serde(default = "default_weather_dataset")]
    pub dataset: String,
    #[serde(default = "default_weather_table")]
    pub table: String,
}

fn default_weather_dataset() -> String {
    "weather_data".to_string()
}
fn default_weather_table() -> String {
    "raw_weatherapp".to_string()
}

impl Default for WeatherTableConfig {
    fn default() -> Self {
        Self {
            dataset: default_weather_dataset(),
            table: default_weather_table(),
        }
    }
}

/// Destination and keyword cohorts for trends rows.
#[derive(Debug, Clone, Deserialize)]
pub struct TrendsTableConfig {
    #[serde(default = "default_trends_dataset")]
    pub dataset: String,
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    #[serde(default)]
    pub cohorts: Vec<TrendsCohortConfig>,
}

fn default_trends_dataset() -> String {
    "google_trends".to_string()
}
fn default_table_prefix() -> String {
    "searchwords_new".to_string()
}

impl Default for TrendsTableConfig {
    fn default() -> Self {
        Self {
            dataset: default_trends_dataset(),
            table_prefix: default_table_prefix(),
            cohorts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendsCohortConfig {
    pub keywords: Vec<String>,
    /// Table suffix. Defaults to the cohort's 1-based position.
    pub suffix: Option<String>,
}

impl FeedlineConfig {
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.upstream.timeouts.connect_secs),
            read: Duration::from_secs(self.upstream.timeouts.read_secs),
        }
    }

    /// Retry policy for upstream fetches.
    ///
    /// Assumes a validated config: a negative or non-finite base delay
    /// collapses to zero.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::try_from_secs_f64(self.retry.base_delay_secs)
                .unwrap_or(Duration::ZERO),
            scale_factor: self.retry.scale_factor,
        }
    }

    /// Trends cohorts in configuration order, suffixed `1..n` unless an
    /// explicit suffix is given.
    #[must_use]
    pub fn trends_cohorts(&self) -> Vec<Cohort> {
        self.trends
            .cohorts
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let suffix = c.suffix.clone().unwrap_or_else(|| (i + 1).to_string());
                Cohort::trends(suffix, c.keywords.clone())
            })
            .collect()
    }

    /// Every configured credential plus `redact`, for masking error details.
    #[must_use]
    pub fn secrets(&self) -> Vec<String> {
        let mut secrets = self.redact.clone();
        if let Some(weather) = &self.upstream.weather {
            secrets.push(weather.api_key.clone());
        }
        if let Some(token) = &self.warehouse.bigquery.access_token {
            secrets.push(token.clone());
        }
        if let Some(pg) = &self.warehouse.postgres {
            secrets.push(pg.password.clone());
        }
        secrets.retain(|s| !s.is_empty());
        secrets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version: "1.0"
warehouse:
  backend: sqlite
  project: local
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: FeedlineConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.parallelism, 1);
        assert!(config.upstream.weather.is_none());
        assert_eq!(config.upstream.trends.hl, "sv");
        assert_eq!(config.upstream.trends.timeframe, "today 3-m");
        assert_eq!(config.upstream.trends.geo, "SE-AB");
        assert_eq!(config.weather.dataset, "weather_data");
        assert_eq!(config.weather.table, "raw_weatherapp");
        assert_eq!(config.trends.dataset, "google_trends");
        assert_eq!(config.trends.table_prefix, "searchwords_new");
        assert_eq!(config.warehouse.bigquery.api_base, DEFAULT_BIGQUERY_API_BASE);
    }

    #[test]
    fn default_retry_policy_matches_executor_defaults() {
        let config: FeedlineConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn default_timeouts_split_connect_and_read() {
        let config: FeedlineConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.timeouts(), Timeouts::default());
    }

    #[test]
    fn trends_cohorts_are_numbered_unless_suffixed() {
        let yaml = format!(
            "{MINIMAL}trends:\n  cohorts:\n    - keywords: [snaps, glass]\n    - keywords: [sill]\n      suffix: midsommar\n    - keywords: [grill]\n"
        );
        let config: FeedlineConfig = serde_yaml::from_str(&yaml).unwrap();
        let cohorts = config.trends_cohorts();
        let suffixes: Vec<_> = cohorts
            .iter()
            .map(|c| c.table_suffix.clone().unwrap())
            .collect();
        assert_eq!(suffixes, vec!["1", "midsommar", "3"]);
        assert_eq!(cohorts[0].name, "trends_1");
    }

    #[test]
    fn trends_offset_follows_stockholm_daylight_saving() {
        let trends = TrendsUpstreamConfig::default();
        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let summer = Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap();
        assert_eq!(trends.tz_offset_at(winter), Some(60));
        assert_eq!(trends.tz_offset_at(summer), Some(120));
    }

    #[test]
    fn fixed_tz_overrides_timezone() {
        let trends = TrendsUpstreamConfig {
            timezone: "Not/AZone".into(),
            tz: Some(-300),
            ..TrendsUpstreamConfig::default()
        };
        let summer = Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap();
        assert_eq!(trends.tz_offset_at(summer), Some(-300));

        let unknown = TrendsUpstreamConfig {
            timezone: "Not/AZone".into(),
            ..TrendsUpstreamConfig::default()
        };
        assert_eq!(unknown.tz_offset_at(summer), None);
    }

    #[test]
    fn secrets_collects_credentials() {
        let yaml = r#"
version: "1.0"
upstream:
  weather:
    base_url: https://api.weather.example/v1/forecast.json
    api_key: abc123
warehouse:
  backend: bigquery
  project: team-god
  bigquery:
    access_token: ya29.token
redact: ["internal-host"]
"#;
        let config: FeedlineConfig = serde_yaml::from_str(yaml).unwrap();
        let secrets = config.secrets();
        assert!(secrets.contains(&"abc123".to_string()));
        assert!(secrets.contains(&"ya29.token".to_string()));
        assert!(secrets.contains(&"internal-host".to_string()));
    }

    #[test]
    fn debug_hides_credentials() {
        let yaml = r#"
version: "1.0"
upstream:
  weather:
    base_url: https://api.weather.example/v1/forecast.json
    api_key: abc123
warehouse:
  backend: bigquery
  project: team-god
  bigquery:
    access_token: ya29.token
"#;
        let config: FeedlineConfig = serde_yaml::from_str(yaml).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("abc123"));
        assert!(!rendered.contains("ya29.token"));
    }
}
