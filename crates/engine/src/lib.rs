//! Shopsync Engine - incremental, resumable catalog sync.
//!
//! Mirrors a Shopify store's product catalog into a local commerce catalog,
//! one page at a time. The cursor-paginated fetch loop maps remote
//! products/variants/images onto local records, deduplicating against
//! previously-synced entities and persisting a resumable cursor so sync can
//! proceed page by page (manually or on a recurring tick) without ever
//! double-processing a page or losing position across failures.
//!
//! # Architecture
//!
//! - [`shopify`] - authenticated REST client and the validated remote schema
//! - [`catalog`] - local product/variant/image model and the store abstraction
//! - [`state`] - persisted cursor + last-page summary (the resumable state)
//! - [`sync`] - reconciliation engine, image sync, and the page orchestrator
//! - [`config`] - environment-driven configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use shopsync_engine::config::SyncConfig;
//! use shopsync_engine::shopify::RestClient;
//! use shopsync_engine::sync::{SyncEngine, SyncTrigger};
//!
//! let config = SyncConfig::from_env()?;
//! let client = RestClient::new(&config)?;
//! let engine = SyncEngine::new(
//!     client,
//!     catalog,
//!     state,
//!     config.effective_page_size(),
//!     config.sync_images,
//! );
//!
//! let summary = engine.sync_page(SyncTrigger::Manual).await?;
//! println!("{}", summary.message);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod shopify;
pub mod state;
pub mod sync;

pub use config::{ConfigError, SyncConfig};
pub use shopify::{ProductSource, RestClient, ShopifyError};
pub use sync::{PageSummary, ReconcileOutcome, SyncEngine, SyncError, SyncTrigger};
