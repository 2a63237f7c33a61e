use std::path::Path;

use anyhow::Result;

/// Execute the `trends` command: every configured keyword cohort.
pub async fn execute(config_path: &Path) -> Result<()> {
    let trigger = super::build_trigger(config_path).await?;
    let report = trigger.run_trends().await?;

    println!("Trends run completed successfully.");
    for outcome in &report.outcomes {
        if let Ok(success) = &outcome.result {
            println!(
                "  {:12} {:48} loaded {:5} written {:5} attempts {}",
                outcome.cohort,
                outcome.destination.to_string(),
                success.rows_loaded,
                success.rows_written,
                success.attempts
            );
        }
    }
    println!("  Rows written:    {}", report.rows_written());
    Ok(())
}
