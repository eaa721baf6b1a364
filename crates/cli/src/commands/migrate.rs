//! Database migration command.

use shopsync_engine::catalog::{init_pool, run_migrations};
use shopsync_engine::config::SyncConfig;
use tracing::info;

use super::CliError;

/// Open (creating if missing) the configured database and apply migrations.
pub async fn run() -> Result<(), CliError> {
    let config = SyncConfig::from_env()?;

    info!(database_url = %config.database_url, "connecting");
    let pool = init_pool(&config.database_url).await?;

    info!("running migrations");
    run_migrations(&pool).await?;

    info!("migrations complete");
    Ok(())
}
