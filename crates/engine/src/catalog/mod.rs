//! Local catalog model and store abstraction.
//!
//! The reconciliation engine owns the mapping logic; the catalog store owns
//! record storage and lifecycle. Two implementations ship with the engine:
//! an in-memory store for tests and dry runs, and a `SQLite` store for real
//! mirroring.
//!
//! Every local record carries a durable cross-reference to the remote entity
//! it mirrors (the reconciliation key) so a later sync pass can find it again
//! instead of creating a duplicate.

mod memory;
mod sqlite;

pub use memory::MemoryCatalog;
pub use sqlite::{SqliteCatalog, init_pool, run_migrations};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopsync_core::{ImageId, ProductId, RemoteImageId, RemoteProductId, RemoteVariantId, VariantId};
use thiserror::Error;

/// Error type for catalog store operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored price {0:?} is not a decimal")]
    InvalidPrice(String),
    #[error("store error: {0}")]
    Backend(String),
}

/// Whether a product is a single sellable unit or a set of variations.
///
/// Decided once, on the create path, and fixed for the record's lifetime;
/// shared fields live on [`ProductRecord`] regardless of kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductKind {
    /// Single SKU/price, no variation axes.
    Simple {
        /// SKU copied from the product's only variant.
        sku: Option<String>,
    },
    /// Carries variation axes and owns variant records.
    Variable {
        /// The declared option axes, in position order.
        axes: Vec<VariationAxis>,
    },
}

impl ProductKind {
    /// Short tag used for storage and diagnostics.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Simple { .. } => "simple",
            Self::Variable { .. } => "variable",
        }
    }
}

/// A named variation axis owned by a variable product.
///
/// Variant attribute values reference these axes by name, so axes must be
/// persisted with the parent before any variant record is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationAxis {
    /// Axis name (e.g., "Color"); never the `"Title"` placeholder.
    pub name: String,
    /// 0-based display position.
    pub position: i32,
    /// Values along this axis.
    pub values: Vec<String>,
}

/// A mirrored product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Local ID; `None` until first persisted.
    pub id: Option<ProductId>,
    /// Reconciliation key back to the remote product.
    pub remote_id: RemoteProductId,
    /// Display name.
    pub name: String,
    /// HTML description.
    pub description: String,
    /// URL slug derived from the title.
    pub slug: String,
    /// Parsed tag list.
    pub tags: Vec<String>,
    /// Primary image, when image sync is enabled.
    pub featured_image: Option<ImageId>,
    /// When this record was last written by a sync pass.
    pub last_synced: DateTime<Utc>,
    /// Simple or variable, with the kind-specific payload.
    pub kind: ProductKind,
}

/// A mirrored variation of a variable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Local ID; `None` until first persisted.
    pub id: Option<VariantId>,
    /// Owning local product.
    pub parent: ProductId,
    /// Reconciliation key back to the remote variant.
    pub remote_id: RemoteVariantId,
    /// Axis-name to value pairs, in axis order.
    pub attributes: Vec<(String, String)>,
    /// Price shown when not on sale.
    pub regular_price: Decimal,
    /// Discounted price, when the remote compare-at price exceeds the listed
    /// price.
    pub sale_price: Option<Decimal>,
    /// SKU code.
    pub sku: Option<String>,
    /// Whether stock is tracked for this variation.
    pub manage_stock: bool,
    /// Quantity on hand, when tracked.
    pub stock_quantity: Option<i64>,
    /// Whether the variation is currently purchasable.
    pub in_stock: bool,
    /// Variant-specific image.
    pub image: Option<ImageId>,
    /// When this record was last written by a sync pass.
    pub last_synced: DateTime<Utc>,
}

/// A downloaded image asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Local ID; `None` until first persisted.
    pub id: Option<ImageId>,
    /// Dedup key: the remote image ID, when the payload carried one.
    pub remote_id: Option<RemoteImageId>,
    /// Product the asset belongs to.
    pub parent: Option<ProductId>,
    /// File name of the stored binary.
    pub filename: String,
    /// Alt text.
    pub alt: Option<String>,
    /// Whether this was the product's primary image.
    pub featured: bool,
    /// Remote variant this image is specifically for, if any.
    pub variant_key: Option<RemoteVariantId>,
}

/// Storage backend for mirrored products, variants, and images.
///
/// The store owns record lifecycle; the reconciliation engine only decides
/// what to write. Lookups by remote ID are the dedup/idempotency mechanism.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Find a product by its reconciliation key.
    async fn find_product(
        &self,
        remote_id: RemoteProductId,
    ) -> Result<Option<ProductId>, CatalogError>;

    /// Load a full product record.
    async fn load_product(&self, id: ProductId) -> Result<Option<ProductRecord>, CatalogError>;

    /// Create or update a product, including its variation axes.
    ///
    /// Axes are persisted with the parent, before any variant record, because
    /// variant attributes reference them by name.
    async fn upsert_product(&self, record: &ProductRecord) -> Result<ProductId, CatalogError>;

    /// Find a variant under a parent by its reconciliation key.
    async fn find_variant(
        &self,
        parent: ProductId,
        remote_id: RemoteVariantId,
    ) -> Result<Option<VariantId>, CatalogError>;

    /// Load a full variant record. A known ID whose record cannot be loaded
    /// yields `None`; callers must treat that as "not found" rather than
    /// trusting the dangling reference.
    async fn load_variant(&self, id: VariantId) -> Result<Option<VariantRecord>, CatalogError>;

    /// Create or update a variant record.
    async fn upsert_variant(&self, record: &VariantRecord) -> Result<VariantId, CatalogError>;

    /// Reconciliation keys of all previously-synced variants of a parent.
    async fn variant_remote_ids(
        &self,
        parent: ProductId,
    ) -> Result<Vec<RemoteVariantId>, CatalogError>;

    /// Delete variants of `parent` whose reconciliation key is not in `keep`.
    /// Returns the number of records removed.
    async fn prune_variants(
        &self,
        parent: ProductId,
        keep: &[RemoteVariantId],
    ) -> Result<u64, CatalogError>;

    /// Find an already-imported image by its dedup key.
    async fn find_image(&self, remote_id: RemoteImageId) -> Result<Option<ImageId>, CatalogError>;

    /// Store an image binary and its record, returning the local ID.
    async fn import_image(
        &self,
        bytes: &[u8],
        record: &ImageRecord,
    ) -> Result<ImageId, CatalogError>;

    /// Add an image to a product's gallery (idempotent).
    async fn attach_gallery_image(
        &self,
        parent: ProductId,
        image: ImageId,
    ) -> Result<(), CatalogError>;
}
