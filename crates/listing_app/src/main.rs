//! `harvester`: crawls rental listings and keeps the shortlist on disk.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use listing_logging::{listing_info, parse_level, LogDestination, DEFAULT_LOG_FILE};
use log::LevelFilter;

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "harvester", version, about = "Rental listing harvester")]
struct Cli {
    /// Path to the RON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan result pages and classify new listings
    Crawl,

    /// Print stored listings, cheapest per person first
    Review {
        /// Include unsuitable and undecided listings
        #[arg(long)]
        all: bool,
    },

    /// Mark a listing as contacted
    Contacted { id: String },

    /// Permanently exclude a listing
    Exclude { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = AppConfig::load(&cli.config)?;
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        parse_level(&config.log_level)
    };
    listing_logging::initialize(LogDestination::Both(PathBuf::from(DEFAULT_LOG_FILE)), level);

    if found {
        listing_info!("Loaded configuration from {}", cli.config.display());
    } else {
        listing_info!(
            "No configuration at {}, using defaults",
            cli.config.display()
        );
    }

    match cli.command {
        Command::Crawl => {
            let summary = commands::crawl(&config).await?;
            listing_info!(
                "Crawl complete: {} new listings, {} suitable, {} too expensive, {} excluded",
                summary.discovered,
                summary.suitable,
                summary.too_expensive,
                summary.excluded_gone + summary.excluded_rejected
            );
        }
        Command::Review { all } => print!("{}", commands::review(&config, all)?),
        Command::Contacted { id } => commands::mark_contacted(&config, &id)?,
        Command::Exclude { id } => commands::exclude(&config, &id)?,
    }
    Ok(())
}
