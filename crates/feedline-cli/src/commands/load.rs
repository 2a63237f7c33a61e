use std::path::Path;

use anyhow::{Context, Result};

/// Execute the `load` command: transform and load a saved weather document.
pub async fn execute(config_path: &Path, payload_path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(payload_path)
        .with_context(|| format!("Failed to read payload: {}", payload_path.display()))?;
    let body: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Payload is not JSON: {}", payload_path.display()))?;

    let trigger = super::build_trigger(config_path).await?;
    let result = trigger.load_weather_payload(body).await?;

    println!("Loaded into {}.", result.destination);
    println!("  Rows attempted:  {}", result.rows_attempted);
    println!("  Rows written:    {}", result.rows_written);
    if result.rows_skipped() > 0 {
        println!("  Already present: {}", result.rows_skipped());
    }
    Ok(())
}
