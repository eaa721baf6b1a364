//! Command implementations and shared wiring.

pub mod check;
pub mod migrate;
pub mod status;
pub mod sync;

use shopsync_engine::catalog::{CatalogError, SqliteCatalog, init_pool, run_migrations};
use shopsync_engine::config::{ConfigError, SyncConfig};
use shopsync_engine::shopify::{RestClient, ShopifyError};
use shopsync_engine::state::SqliteStateStore;
use shopsync_engine::sync::{SyncEngine, SyncError};
use thiserror::Error;

/// The production engine: REST source, `SQLite` catalog and state.
pub type Engine = SyncEngine<RestClient, SqliteCatalog, SqliteStateStore>;

/// Top-level command error; every variant already carries a readable message.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Shopify(#[from] ShopifyError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Open the database, apply migrations, and assemble the engine.
pub async fn build_engine(config: &SyncConfig) -> Result<Engine, CliError> {
    let pool = init_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let catalog = SqliteCatalog::new(pool.clone(), config.media_dir.clone());
    let state = SqliteStateStore::new(pool);
    let client = RestClient::new(config)?;

    Ok(SyncEngine::new(
        client,
        catalog,
        state,
        config.effective_page_size(),
        config.sync_images,
    ))
}
