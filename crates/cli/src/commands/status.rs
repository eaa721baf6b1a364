//! Sync status readout.

use shopsync_engine::config::SyncConfig;

use super::{CliError, build_engine};

/// Print the cursor position, completion timestamps, and last-page summary.
#[allow(clippy::print_stdout)]
pub async fn run() -> Result<(), CliError> {
    let config = SyncConfig::from_env()?;
    let engine = build_engine(&config).await?;
    let state = engine.state().await?;

    println!("Shop:              {}", config.shop_domain);
    println!("Cursor:            {}", state.cursor);
    println!(
        "Last manual run:   {}",
        state
            .last_completed_manual
            .map_or_else(|| "never".to_string(), |at| at.to_rfc3339())
    );
    println!(
        "Last scheduled run: {}",
        state
            .last_completed_auto
            .map_or_else(|| "never".to_string(), |at| at.to_rfc3339())
    );

    match &state.last_summary {
        Some(summary) => {
            println!(
                "Last page:         {} ({} attempted, {} processed, {} skipped, {} failed)",
                summary.page,
                summary.attempted,
                summary.processed,
                summary.skipped,
                summary.failed
            );
        }
        None => println!("Last page:         no sync has run yet"),
    }
    Ok(())
}
