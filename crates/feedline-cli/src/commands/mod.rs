pub mod check;
pub mod ingest;
pub mod load;
pub mod trends;

use std::path::Path;

use anyhow::{Context, Result};
use feedline_engine::config::{parser, validator, FeedlineConfig};
use feedline_engine::Trigger;

/// Parse and validate the config file.
pub(crate) fn load_config(config_path: &Path) -> Result<FeedlineConfig> {
    let config = parser::parse_config(config_path)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
    validator::validate_config(&config)?;
    Ok(config)
}

/// Parse, validate and build the process-wide handles.
pub(crate) async fn build_trigger(config_path: &Path) -> Result<Trigger> {
    let config = load_config(config_path)?;
    tracing::info!(
        project = %config.warehouse.project,
        backend = ?config.warehouse.backend,
        cohorts = config.trends.cohorts.len(),
        "Config validated"
    );
    Ok(Trigger::from_config(&config).await?)
}
