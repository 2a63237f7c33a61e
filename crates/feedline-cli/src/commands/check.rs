use std::path::Path;

use anyhow::Result;
use feedline_engine::resolve;

/// Execute the `check` command: validate config and destination connectivity.
///
/// Makes no upstream calls.
pub async fn execute(config_path: &Path) -> Result<()> {
    // 1. Parse and validate
    let config = super::load_config(config_path)?;
    println!("Config structure:  OK");

    // 2. Summarize what a run would do
    println!(
        "Weather upstream:  {}",
        if config.upstream.weather.is_some() {
            "configured"
        } else {
            "not configured"
        }
    );
    for cohort in config.trends_cohorts() {
        if let feedline_types::CohortKind::Trends { keywords } = &cohort.kind {
            println!("  {:12} {}", cohort.name, keywords.join(", "));
        }
    }

    // 3. Destination
    if resolve::check_loader(&config).await {
        println!("Destination:       OK");
        println!("\nAll checks passed.");
        Ok(())
    } else {
        println!("Destination:       FAILED");
        anyhow::bail!("One or more checks failed")
    }
}
