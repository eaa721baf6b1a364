//! Page sync commands: one-shot, full-catalog, the watch loop, and reset.

use std::time::Duration;

use shopsync_engine::config::SyncConfig;
use shopsync_engine::sync::{PageSummary, SyncTrigger};
use tracing::info;

use super::{CliError, build_engine};

/// Sync the next page, or every remaining page with `--all`.
pub async fn run(all: bool) -> Result<(), CliError> {
    let config = SyncConfig::from_env()?;
    let engine = build_engine(&config).await?;

    if all {
        let summaries = engine.run_to_completion(SyncTrigger::Manual, None).await?;
        for summary in &summaries {
            print_summary(summary);
        }
    } else {
        print_summary(&engine.sync_page(SyncTrigger::Manual).await?);
    }
    Ok(())
}

/// Sync one page per tick until the process is stopped.
///
/// Once the cursor reaches the end, further ticks are no-ops until an
/// explicit `reset`.
pub async fn watch(interval_secs: u64) -> Result<(), CliError> {
    let config = SyncConfig::from_env()?;
    let engine = build_engine(&config).await?;

    info!(interval_secs, "watch loop started");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        let summary = engine.sync_page(SyncTrigger::Scheduled).await?;
        info!(
            page = %summary.page,
            next = %summary.next_cursor,
            "{}",
            summary.message
        );
    }
}

/// Clear sync state; the next sync starts from the first page.
pub async fn reset() -> Result<(), CliError> {
    let config = SyncConfig::from_env()?;
    let engine = build_engine(&config).await?;
    engine.reset().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Sync state cleared; the next sync starts from the first page.");
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_summary(summary: &PageSummary) {
    println!(
        "page {}: {} (next: {})",
        summary.page, summary.message, summary.next_cursor
    );
}
