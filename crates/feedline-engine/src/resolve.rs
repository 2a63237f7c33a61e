//! Upstream and destination construction from configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use feedline_sink::{BatchLoader, BigQueryLoader, PostgresLoader, SqliteLoader};
use feedline_upstream::{
    build_http_client, HttpUpstream, TrendsClient, TrendsSettings, UpstreamClient, WeatherClient,
};

use crate::config::types::{FeedlineConfig, WarehouseBackend};

/// One shared HTTP client for both providers.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_upstream(config: &FeedlineConfig) -> Result<Arc<dyn UpstreamClient>> {
    let http = build_http_client(config.timeouts()).context("Failed to build HTTP client")?;

    let weather = config
        .upstream
        .weather
        .as_ref()
        .map(|w| WeatherClient::new(http.clone(), &w.base_url, &w.api_key));
    let trends = &config.upstream.trends;
    let tz = trends.tz_offset_at(Utc::now()).with_context(|| {
        format!("Unknown upstream.trends.timezone '{}'", trends.timezone)
    })?;
    let trends = TrendsClient::new(
        http,
        TrendsSettings {
            base_url: trends.base_url.trim_end_matches('/').to_string(),
            hl: trends.hl.clone(),
            tz,
        },
    );

    Ok(Arc::new(HttpUpstream::new(weather, Some(trends))) as Arc<dyn UpstreamClient>)
}

fn default_sqlite_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".feedline").join("warehouse.db")
}

/// Open the configured destination.
///
/// # Errors
///
/// Returns an error if the destination cannot be opened or reached.
pub async fn build_loader(config: &FeedlineConfig) -> Result<Arc<dyn BatchLoader>> {
    let warehouse = &config.warehouse;
    match warehouse.backend {
        WarehouseBackend::Bigquery => {
            let http =
                build_http_client(config.timeouts()).context("Failed to build HTTP client")?;
            let loader = BigQueryLoader::new(
                http,
                &warehouse.bigquery.api_base,
                warehouse.bigquery.access_token.clone(),
            );
            Ok(Arc::new(loader) as Arc<dyn BatchLoader>)
        }
        WarehouseBackend::Postgres => {
            let pg = warehouse
                .postgres
                .as_ref()
                .context("warehouse.postgres section is required for the postgres backend")?;
            let loader = PostgresLoader::connect(pg)
                .await
                .context("Failed to connect to PostgreSQL destination")?;
            Ok(Arc::new(loader) as Arc<dyn BatchLoader>)
        }
        WarehouseBackend::Sqlite => {
            let path = warehouse
                .sqlite
                .path
                .as_ref()
                .map_or_else(default_sqlite_path, PathBuf::from);
            let loader = SqliteLoader::open(Path::new(&path))
                .with_context(|| format!("Failed to open SQLite destination {}", path.display()))?;
            Ok(Arc::new(loader) as Arc<dyn BatchLoader>)
        }
    }
}

/// Try to open the destination, logging the outcome.
pub async fn check_loader(config: &FeedlineConfig) -> bool {
    match build_loader(config).await {
        Ok(loader) => {
            tracing::info!(backend = loader.name(), "Destination: OK");
            true
        }
        Err(e) => {
            tracing::error!("Destination: FAILED: {e:#}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_config_str;
    use feedline_types::TableRef;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sqlite_backend_opens_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("wh").join("feedline.db");
        let yaml = format!(
            "version: \"1.0\"\nwarehouse:\n  backend: sqlite\n  project: local\n  sqlite:\n    path: {}\n",
            db_path.display()
        );
        let config = parse_config_str(&yaml).unwrap();

        let loader = build_loader(&config).await.unwrap();
        assert_eq!(loader.name(), "sqlite");
        let result = loader
            .load(&[], &TableRef::new("local", "weather_data", "raw_weatherapp"))
            .await
            .unwrap();
        assert_eq!(result.rows_attempted, 0);
        assert!(db_path.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn bigquery_backend_builds_without_network() {
        let config = parse_config_str(
            "version: \"1.0\"\nwarehouse:\n  backend: bigquery\n  project: team-god\n",
        )
        .unwrap();
        let loader = build_loader(&config).await.unwrap();
        assert_eq!(loader.name(), "bigquery");
    }

    #[tokio::test]
    async fn postgres_backend_without_section_fails() {
        let config = parse_config_str(
            "version: \"1.0\"\nwarehouse:\n  backend: postgres\n  project: p\n",
        )
        .unwrap();
        assert!(!check_loader(&config).await);
    }

    #[test]
    fn upstream_builds_from_minimal_config() {
        let config = parse_config_str(
            "version: \"1.0\"\nwarehouse:\n  backend: sqlite\n  project: p\n",
        )
        .unwrap();
        assert!(build_upstream(&config).is_ok());
    }
}
