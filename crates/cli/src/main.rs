//! Shopsync CLI - page-by-page Shopify catalog sync.
//!
//! # Usage
//!
//! ```bash
//! # Sync the next page of products
//! shopsync sync
//!
//! # Sync every remaining page
//! shopsync sync --all
//!
//! # Sync one page per hour until stopped
//! shopsync watch --interval 3600
//!
//! # Show cursor position and the last run's summary
//! shopsync status
//!
//! # Start over from the first page
//! shopsync reset
//!
//! # Verify API credentials
//! shopsync check
//!
//! # Apply database migrations
//! shopsync migrate
//! ```
//!
//! # Environment
//!
//! Configuration is environment-driven (`SHOPSYNC_*` variables, `.env`
//! supported); see the engine's config module for the full list.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "shopsync")]
#[command(author, version, about = "Shopify catalog sync tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the next page of products
    Sync {
        /// Keep going until the whole listing is synced
        #[arg(long)]
        all: bool,
    },
    /// Sync one page per interval tick until stopped
    Watch {
        /// Seconds between page syncs
        #[arg(long, default_value_t = 3600)]
        interval: u64,
    },
    /// Show cursor position, completion times, and the last summary
    Status,
    /// Clear sync state; the next sync starts from the first page
    Reset,
    /// Test API credentials against the shop endpoint
    Check,
    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Sync { all } => commands::sync::run(all).await,
        Commands::Watch { interval } => commands::sync::watch(interval).await,
        Commands::Status => commands::status::run().await,
        Commands::Reset => commands::sync::reset().await,
        Commands::Check => commands::check::run().await,
        Commands::Migrate => commands::migrate::run().await,
    }
}
