use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;

/// Execute the `ingest` command: one weather cohort end to end.
///
/// Prints the loaded rows as JSON on stdout.
pub async fn execute(config_path: &Path, location: &str, date: NaiveDate) -> Result<()> {
    let trigger = super::build_trigger(config_path).await?;
    let rows = trigger.ingest_weather(location, date).await?;

    eprintln!("Loaded {} row(s) for {location} on {date}.", rows.len());
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
