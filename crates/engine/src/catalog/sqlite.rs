//! `SQLite`-backed catalog store.
//!
//! Records live in the database; image binaries are written to the media
//! directory as plain files and referenced by filename. All queries use the
//! runtime API with explicit binds so the crate builds without a database.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shopsync_core::{ImageId, ProductId, RemoteImageId, RemoteProductId, RemoteVariantId, VariantId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use super::{
    CatalogError, CatalogStore, ImageRecord, ProductKind, ProductRecord, VariantRecord,
    VariationAxis,
};

/// Open (and create if missing) the `SQLite` database at `database_url`.
///
/// # Errors
///
/// Returns [`CatalogError::Database`] when the URL is invalid or the
/// database cannot be opened.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool, CatalogError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(pool)
}

/// Apply pending schema migrations.
///
/// # Errors
///
/// Returns [`CatalogError::Migrate`] when a migration fails to apply.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), CatalogError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Catalog store backed by `SQLite` plus a media directory for image files.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
    media_dir: PathBuf,
}

impl SqliteCatalog {
    #[must_use]
    pub fn new(pool: SqlitePool, media_dir: PathBuf) -> Self {
        Self { pool, media_dir }
    }

    fn product_from_row(row: &SqliteRow) -> Result<ProductRecord, CatalogError> {
        let kind_tag: String = row.try_get("kind")?;
        let kind = match kind_tag.as_str() {
            "variable" => {
                let axes_json: Option<String> = row.try_get("axes")?;
                let axes: Vec<VariationAxis> = match axes_json {
                    Some(json) => serde_json::from_str(&json)?,
                    None => Vec::new(),
                };
                ProductKind::Variable { axes }
            }
            _ => ProductKind::Simple {
                sku: row.try_get("sku")?,
            },
        };

        let tags_json: String = row.try_get("tags")?;
        Ok(ProductRecord {
            id: Some(row.try_get::<ProductId, _>("id")?),
            remote_id: row.try_get("remote_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            slug: row.try_get("slug")?,
            tags: serde_json::from_str(&tags_json)?,
            featured_image: row.try_get("featured_image")?,
            last_synced: row.try_get::<DateTime<Utc>, _>("last_synced")?,
            kind,
        })
    }

    fn variant_from_row(row: &SqliteRow) -> Result<VariantRecord, CatalogError> {
        let attributes_json: String = row.try_get("attributes")?;
        let regular_raw: String = row.try_get("regular_price")?;
        let sale_raw: Option<String> = row.try_get("sale_price")?;

        Ok(VariantRecord {
            id: Some(row.try_get::<VariantId, _>("id")?),
            parent: row.try_get("product_id")?,
            remote_id: row.try_get("remote_id")?,
            attributes: serde_json::from_str(&attributes_json)?,
            regular_price: parse_price(&regular_raw)?,
            sale_price: sale_raw.as_deref().map(parse_price).transpose()?,
            sku: row.try_get("sku")?,
            manage_stock: row.try_get("manage_stock")?,
            stock_quantity: row.try_get("stock_quantity")?,
            in_stock: row.try_get("in_stock")?,
            image: row.try_get("image")?,
            last_synced: row.try_get::<DateTime<Utc>, _>("last_synced")?,
        })
    }
}

fn parse_price(raw: &str) -> Result<Decimal, CatalogError> {
    Decimal::from_str(raw).map_err(|_| CatalogError::InvalidPrice(raw.to_string()))
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn find_product(
        &self,
        remote_id: RemoteProductId,
    ) -> Result<Option<ProductId>, CatalogError> {
        let id = sqlx::query_scalar::<_, ProductId>("SELECT id FROM products WHERE remote_id = ?")
            .bind(remote_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn load_product(&self, id: ProductId) -> Result<Option<ProductRecord>, CatalogError> {
        let row = sqlx::query("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::product_from_row).transpose()
    }

    #[instrument(skip(self, record), fields(remote_id = %record.remote_id))]
    async fn upsert_product(&self, record: &ProductRecord) -> Result<ProductId, CatalogError> {
        let (sku, axes_json) = match &record.kind {
            ProductKind::Simple { sku } => (sku.clone(), None),
            ProductKind::Variable { axes } => (None, Some(serde_json::to_string(axes)?)),
        };
        let tags_json = serde_json::to_string(&record.tags)?;

        let id = sqlx::query_scalar::<_, ProductId>(
            r"
            INSERT INTO products
                (remote_id, name, description, slug, tags, kind, sku, axes,
                 featured_image, last_synced)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(remote_id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                slug = excluded.slug,
                tags = excluded.tags,
                kind = excluded.kind,
                sku = excluded.sku,
                axes = excluded.axes,
                featured_image = excluded.featured_image,
                last_synced = excluded.last_synced
            RETURNING id
            ",
        )
        .bind(record.remote_id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.slug)
        .bind(tags_json)
        .bind(record.kind.tag())
        .bind(sku)
        .bind(axes_json)
        .bind(record.featured_image)
        .bind(record.last_synced)
        .fetch_one(&self.pool)
        .await?;

        debug!(%id, "product upserted");
        Ok(id)
    }

    async fn find_variant(
        &self,
        parent: ProductId,
        remote_id: RemoteVariantId,
    ) -> Result<Option<VariantId>, CatalogError> {
        let id = sqlx::query_scalar::<_, VariantId>(
            "SELECT id FROM variants WHERE product_id = ? AND remote_id = ?",
        )
        .bind(parent)
        .bind(remote_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn load_variant(&self, id: VariantId) -> Result<Option<VariantRecord>, CatalogError> {
        let row = sqlx::query("SELECT * FROM variants WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::variant_from_row).transpose()
    }

    #[instrument(skip(self, record), fields(remote_id = %record.remote_id))]
    async fn upsert_variant(&self, record: &VariantRecord) -> Result<VariantId, CatalogError> {
        let attributes_json = serde_json::to_string(&record.attributes)?;

        let id = sqlx::query_scalar::<_, VariantId>(
            r"
            INSERT INTO variants
                (product_id, remote_id, attributes, regular_price, sale_price,
                 sku, manage_stock, stock_quantity, in_stock, image, last_synced)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(product_id, remote_id) DO UPDATE SET
                attributes = excluded.attributes,
                regular_price = excluded.regular_price,
                sale_price = excluded.sale_price,
                sku = excluded.sku,
                manage_stock = excluded.manage_stock,
                stock_quantity = excluded.stock_quantity,
                in_stock = excluded.in_stock,
                image = excluded.image,
                last_synced = excluded.last_synced
            RETURNING id
            ",
        )
        .bind(record.parent)
        .bind(record.remote_id)
        .bind(attributes_json)
        .bind(record.regular_price.to_string())
        .bind(record.sale_price.map(|price| price.to_string()))
        .bind(&record.sku)
        .bind(record.manage_stock)
        .bind(record.stock_quantity)
        .bind(record.in_stock)
        .bind(record.image)
        .bind(record.last_synced)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn variant_remote_ids(
        &self,
        parent: ProductId,
    ) -> Result<Vec<RemoteVariantId>, CatalogError> {
        let ids = sqlx::query_scalar::<_, RemoteVariantId>(
            "SELECT remote_id FROM variants WHERE product_id = ? ORDER BY remote_id",
        )
        .bind(parent)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn prune_variants(
        &self,
        parent: ProductId,
        keep: &[RemoteVariantId],
    ) -> Result<u64, CatalogError> {
        let mut builder: sqlx::QueryBuilder<'_, sqlx::Sqlite> =
            sqlx::QueryBuilder::new("DELETE FROM variants WHERE product_id = ");
        builder.push_bind(parent);
        if !keep.is_empty() {
            builder.push(" AND remote_id NOT IN (");
            {
                let mut values = builder.separated(", ");
                for remote_id in keep {
                    values.push_bind(*remote_id);
                }
            }
            builder.push(")");
        }

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn find_image(&self, remote_id: RemoteImageId) -> Result<Option<ImageId>, CatalogError> {
        let id = sqlx::query_scalar::<_, ImageId>("SELECT id FROM images WHERE remote_id = ?")
            .bind(remote_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    #[instrument(skip(self, bytes, record), fields(filename = %record.filename))]
    async fn import_image(
        &self,
        bytes: &[u8],
        record: &ImageRecord,
    ) -> Result<ImageId, CatalogError> {
        tokio::fs::create_dir_all(&self.media_dir).await?;
        tokio::fs::write(self.media_dir.join(&record.filename), bytes).await?;

        let id = sqlx::query_scalar::<_, ImageId>(
            r"
            INSERT INTO images (remote_id, product_id, filename, alt, featured, variant_key)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(remote_id) DO UPDATE SET
                product_id = excluded.product_id,
                filename = excluded.filename,
                alt = excluded.alt,
                featured = excluded.featured,
                variant_key = excluded.variant_key
            RETURNING id
            ",
        )
        .bind(record.remote_id)
        .bind(record.parent)
        .bind(&record.filename)
        .bind(&record.alt)
        .bind(record.featured)
        .bind(record.variant_key)
        .fetch_one(&self.pool)
        .await?;

        debug!(%id, size = bytes.len(), "image imported");
        Ok(id)
    }

    async fn attach_gallery_image(
        &self,
        parent: ProductId,
        image: ImageId,
    ) -> Result<(), CatalogError> {
        sqlx::query("INSERT OR IGNORE INTO product_gallery (product_id, image_id) VALUES (?, ?)")
            .bind(parent)
            .bind(image)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    async fn test_store() -> SqliteCatalog {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let media_dir = std::env::temp_dir().join(format!("shopsync-test-{}", uuid::Uuid::new_v4()));
        SqliteCatalog::new(pool, media_dir)
    }

    fn product(remote_id: i64, kind: ProductKind) -> ProductRecord {
        ProductRecord {
            id: None,
            remote_id: RemoteProductId::new(remote_id),
            name: "Winter Hat".to_string(),
            description: "<p>Warm.</p>".to_string(),
            slug: "winter-hat".to_string(),
            tags: vec!["winter".to_string(), "hats".to_string()],
            featured_image: None,
            last_synced: Utc::now(),
            kind,
        }
    }

    fn variant(parent: ProductId, remote_id: i64) -> VariantRecord {
        VariantRecord {
            id: None,
            parent,
            remote_id: RemoteVariantId::new(remote_id),
            attributes: vec![("Size".to_string(), "M".to_string())],
            regular_price: Decimal::new(2450, 2),
            sale_price: Some(Decimal::new(1999, 2)),
            sku: Some("HAT-M".to_string()),
            manage_stock: true,
            stock_quantity: Some(4),
            in_stock: true,
            image: None,
            last_synced: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_product_round_trip_variable() {
        let store = test_store().await;
        let axes = vec![VariationAxis {
            name: "Size".to_string(),
            position: 0,
            values: vec!["S".to_string(), "M".to_string()],
        }];
        let record = product(100, ProductKind::Variable { axes: axes.clone() });

        let id = store.upsert_product(&record).await.unwrap();
        assert_eq!(store.find_product(record.remote_id).await.unwrap(), Some(id));

        let loaded = store.load_product(id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Winter Hat");
        assert_eq!(loaded.tags, vec!["winter", "hats"]);
        assert_eq!(loaded.kind, ProductKind::Variable { axes });
    }

    #[tokio::test]
    async fn test_product_upsert_updates_in_place() {
        let store = test_store().await;
        let mut record = product(100, ProductKind::Simple { sku: Some("HAT".to_string()) });
        let first = store.upsert_product(&record).await.unwrap();

        record.name = "Winter Hat (Deluxe)".to_string();
        let second = store.upsert_product(&record).await.unwrap();
        assert_eq!(first, second);

        let loaded = store.load_product(first).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Winter Hat (Deluxe)");
    }

    #[tokio::test]
    async fn test_variant_round_trip_preserves_prices() {
        let store = test_store().await;
        let parent = store
            .upsert_product(&product(100, ProductKind::Variable { axes: vec![] }))
            .await
            .unwrap();
        let id = store.upsert_variant(&variant(parent, 1)).await.unwrap();

        let loaded = store.load_variant(id).await.unwrap().unwrap();
        assert_eq!(loaded.regular_price.to_string(), "24.50");
        assert_eq!(loaded.sale_price.unwrap().to_string(), "19.99");
        assert_eq!(loaded.attributes, vec![("Size".to_string(), "M".to_string())]);
    }

    #[tokio::test]
    async fn test_prune_variants_with_empty_keep_removes_all() {
        let store = test_store().await;
        let parent = store
            .upsert_product(&product(100, ProductKind::Variable { axes: vec![] }))
            .await
            .unwrap();
        store.upsert_variant(&variant(parent, 1)).await.unwrap();
        store.upsert_variant(&variant(parent, 2)).await.unwrap();

        let removed = store.prune_variants(parent, &[]).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.variant_remote_ids(parent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_image_import_writes_file_and_dedups() {
        let store = test_store().await;
        let record = ImageRecord {
            id: None,
            remote_id: Some(RemoteImageId::new(850_703_190)),
            parent: None,
            filename: "ipod-nano.png".to_string(),
            alt: Some("iPod Nano".to_string()),
            featured: true,
            variant_key: None,
        };

        let first = store.import_image(b"png-bytes", &record).await.unwrap();
        let second = store.import_image(b"png-bytes", &record).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            store.find_image(RemoteImageId::new(850_703_190)).await.unwrap(),
            Some(first)
        );

        let path = store.media_dir.join("ipod-nano.png");
        assert_eq!(std::fs::read(path).unwrap(), b"png-bytes");
        std::fs::remove_dir_all(&store.media_dir).unwrap();
    }
}
