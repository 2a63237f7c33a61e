mod commands;
mod logging;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "feedline",
    version,
    about = "Weather and search-trend ingestion into an analytical warehouse"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the feedline YAML config
    #[arg(long, short, default_value = "feedline.yaml", global = true)]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, transform and load one location's forecast day
    Ingest {
        /// Location query understood by the weather provider (e.g. "Stockholm")
        #[arg(long)]
        location: String,
        /// Forecast date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
    /// Run every configured trends cohort
    Trends,
    /// Transform and load a weather document fetched elsewhere
    Load {
        /// Path to the weather JSON document
        payload: PathBuf,
    },
    /// Validate configuration and destination connectivity
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Ingest { location, date } => {
            commands::ingest::execute(&cli.config, &location, date).await
        }
        Commands::Trends => commands::trends::execute(&cli.config).await,
        Commands::Load { payload } => commands::load::execute(&cli.config, &payload).await,
        Commands::Check => commands::check::execute(&cli.config).await,
    }
}
