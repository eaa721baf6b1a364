//! In-memory catalog store.
//!
//! Backs the engine's test suites and dry runs. Supports injecting write
//! failures per remote ID so partial-failure handling can be exercised
//! without a real backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use shopsync_core::{ImageId, ProductId, RemoteImageId, RemoteProductId, RemoteVariantId, VariantId};
use tokio::sync::Mutex;

use super::{CatalogError, CatalogStore, ImageRecord, ProductRecord, VariantRecord};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    products: HashMap<ProductId, ProductRecord>,
    product_by_remote: HashMap<RemoteProductId, ProductId>,
    variants: HashMap<VariantId, VariantRecord>,
    variant_by_remote: HashMap<(ProductId, RemoteVariantId), VariantId>,
    images: HashMap<ImageId, (ImageRecord, Vec<u8>)>,
    image_by_remote: HashMap<RemoteImageId, ImageId>,
    galleries: HashMap<ProductId, Vec<ImageId>>,
    fail_products: HashSet<RemoteProductId>,
    fail_variants: HashSet<RemoteVariantId>,
    broken_variants: HashSet<VariantId>,
}

impl Inner {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Catalog store holding everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: Mutex<Inner>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `upsert_product` for this remote ID fail.
    pub async fn fail_product_upserts(&self, remote_id: RemoteProductId) {
        self.inner.lock().await.fail_products.insert(remote_id);
    }

    /// Make every `upsert_variant` for this remote ID fail.
    pub async fn fail_variant_upserts(&self, remote_id: RemoteVariantId) {
        self.inner.lock().await.fail_variants.insert(remote_id);
    }

    /// Keep the lookup entry for a variant but make its record unloadable,
    /// simulating a mapping that points at a deleted row.
    pub async fn break_variant(&self, id: VariantId) {
        self.inner.lock().await.broken_variants.insert(id);
    }

    /// Look up a full product record by remote ID.
    pub async fn product_by_remote(&self, remote_id: RemoteProductId) -> Option<ProductRecord> {
        let inner = self.inner.lock().await;
        let id = inner.product_by_remote.get(&remote_id)?;
        inner.products.get(id).cloned()
    }

    /// All variant records of a parent, in remote-ID order.
    pub async fn variants_of(&self, parent: ProductId) -> Vec<VariantRecord> {
        let inner = self.inner.lock().await;
        let mut records: Vec<VariantRecord> = inner
            .variants
            .values()
            .filter(|record| record.parent == parent)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.remote_id);
        records
    }

    pub async fn product_count(&self) -> usize {
        self.inner.lock().await.products.len()
    }

    pub async fn image_count(&self) -> usize {
        self.inner.lock().await.images.len()
    }

    /// Gallery image IDs attached to a product, in attachment order.
    pub async fn gallery_of(&self, parent: ProductId) -> Vec<ImageId> {
        self.inner
            .lock()
            .await
            .galleries
            .get(&parent)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_product(
        &self,
        remote_id: RemoteProductId,
    ) -> Result<Option<ProductId>, CatalogError> {
        Ok(self
            .inner
            .lock()
            .await
            .product_by_remote
            .get(&remote_id)
            .copied())
    }

    async fn load_product(&self, id: ProductId) -> Result<Option<ProductRecord>, CatalogError> {
        Ok(self.inner.lock().await.products.get(&id).cloned())
    }

    async fn upsert_product(&self, record: &ProductRecord) -> Result<ProductId, CatalogError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_products.contains(&record.remote_id) {
            return Err(CatalogError::Backend(format!(
                "injected failure writing product {}",
                record.remote_id
            )));
        }

        let id = match record.id {
            Some(id) => id,
            None => match inner.product_by_remote.get(&record.remote_id) {
                Some(existing) => *existing,
                None => ProductId::new(inner.allocate()),
            },
        };

        let mut stored = record.clone();
        stored.id = Some(id);
        inner.products.insert(id, stored);
        inner.product_by_remote.insert(record.remote_id, id);
        Ok(id)
    }

    async fn find_variant(
        &self,
        parent: ProductId,
        remote_id: RemoteVariantId,
    ) -> Result<Option<VariantId>, CatalogError> {
        Ok(self
            .inner
            .lock()
            .await
            .variant_by_remote
            .get(&(parent, remote_id))
            .copied())
    }

    async fn load_variant(&self, id: VariantId) -> Result<Option<VariantRecord>, CatalogError> {
        let inner = self.inner.lock().await;
        if inner.broken_variants.contains(&id) {
            return Ok(None);
        }
        Ok(inner.variants.get(&id).cloned())
    }

    async fn upsert_variant(&self, record: &VariantRecord) -> Result<VariantId, CatalogError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_variants.contains(&record.remote_id) {
            return Err(CatalogError::Backend(format!(
                "injected failure writing variant {}",
                record.remote_id
            )));
        }

        let key = (record.parent, record.remote_id);
        let id = match record.id {
            Some(id) => id,
            None => match inner.variant_by_remote.get(&key) {
                Some(existing) => *existing,
                None => VariantId::new(inner.allocate()),
            },
        };

        let mut stored = record.clone();
        stored.id = Some(id);
        inner.variants.insert(id, stored);
        inner.variant_by_remote.insert(key, id);
        inner.broken_variants.remove(&id);
        Ok(id)
    }

    async fn variant_remote_ids(
        &self,
        parent: ProductId,
    ) -> Result<Vec<RemoteVariantId>, CatalogError> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<RemoteVariantId> = inner
            .variant_by_remote
            .keys()
            .filter(|(owner, _)| *owner == parent)
            .map(|(_, remote_id)| *remote_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn prune_variants(
        &self,
        parent: ProductId,
        keep: &[RemoteVariantId],
    ) -> Result<u64, CatalogError> {
        let mut inner = self.inner.lock().await;
        let doomed: Vec<(ProductId, RemoteVariantId)> = inner
            .variant_by_remote
            .keys()
            .filter(|(owner, remote_id)| *owner == parent && !keep.contains(remote_id))
            .copied()
            .collect();

        for key in &doomed {
            if let Some(id) = inner.variant_by_remote.remove(key) {
                inner.variants.remove(&id);
            }
        }
        Ok(doomed.len() as u64)
    }

    async fn find_image(&self, remote_id: RemoteImageId) -> Result<Option<ImageId>, CatalogError> {
        Ok(self
            .inner
            .lock()
            .await
            .image_by_remote
            .get(&remote_id)
            .copied())
    }

    async fn import_image(
        &self,
        bytes: &[u8],
        record: &ImageRecord,
    ) -> Result<ImageId, CatalogError> {
        let mut inner = self.inner.lock().await;
        let id = ImageId::new(inner.allocate());
        let mut stored = record.clone();
        stored.id = Some(id);
        inner.images.insert(id, (stored, bytes.to_vec()));
        if let Some(remote_id) = record.remote_id {
            inner.image_by_remote.insert(remote_id, id);
        }
        Ok(id)
    }

    async fn attach_gallery_image(
        &self,
        parent: ProductId,
        image: ImageId,
    ) -> Result<(), CatalogError> {
        let mut inner = self.inner.lock().await;
        let gallery = inner.galleries.entry(parent).or_default();
        if !gallery.contains(&image) {
            gallery.push(image);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::super::ProductKind;
    use super::*;

    fn product(remote_id: i64) -> ProductRecord {
        ProductRecord {
            id: None,
            remote_id: RemoteProductId::new(remote_id),
            name: format!("Product {remote_id}"),
            description: String::new(),
            slug: format!("product-{remote_id}"),
            tags: vec![],
            featured_image: None,
            last_synced: Utc::now(),
            kind: ProductKind::Simple { sku: None },
        }
    }

    fn variant(parent: ProductId, remote_id: i64) -> VariantRecord {
        VariantRecord {
            id: None,
            parent,
            remote_id: RemoteVariantId::new(remote_id),
            attributes: vec![],
            regular_price: Decimal::new(1999, 2),
            sale_price: None,
            sku: None,
            manage_stock: false,
            stock_quantity: None,
            in_stock: true,
            image: None,
            last_synced: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_product_is_idempotent_by_remote_id() {
        let store = MemoryCatalog::new();
        let first = store.upsert_product(&product(100)).await.unwrap();
        let second = store.upsert_product(&product(100)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.product_count().await, 1);
    }

    #[tokio::test]
    async fn test_prune_keeps_listed_variants() {
        let store = MemoryCatalog::new();
        let parent = store.upsert_product(&product(100)).await.unwrap();
        store.upsert_variant(&variant(parent, 1)).await.unwrap();
        store.upsert_variant(&variant(parent, 2)).await.unwrap();
        store.upsert_variant(&variant(parent, 3)).await.unwrap();

        let keep = [RemoteVariantId::new(1), RemoteVariantId::new(3)];
        let removed = store.prune_variants(parent, &keep).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            store.variant_remote_ids(parent).await.unwrap(),
            keep.to_vec()
        );
    }

    #[tokio::test]
    async fn test_injected_failure_only_hits_target() {
        let store = MemoryCatalog::new();
        store
            .fail_product_upserts(RemoteProductId::new(200))
            .await;

        assert!(store.upsert_product(&product(100)).await.is_ok());
        assert!(matches!(
            store.upsert_product(&product(200)).await,
            Err(CatalogError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_broken_variant_loads_as_missing() {
        let store = MemoryCatalog::new();
        let parent = store.upsert_product(&product(100)).await.unwrap();
        let id = store.upsert_variant(&variant(parent, 1)).await.unwrap();

        store.break_variant(id).await;
        assert!(store.load_variant(id).await.unwrap().is_none());
        // The lookup entry survives; re-upserting heals the record.
        assert_eq!(
            store
                .find_variant(parent, RemoteVariantId::new(1))
                .await
                .unwrap(),
            Some(id)
        );
        store.upsert_variant(&variant(parent, 1)).await.unwrap();
        assert!(store.load_variant(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_gallery_attach_is_idempotent() {
        let store = MemoryCatalog::new();
        let parent = store.upsert_product(&product(100)).await.unwrap();
        let image = ImageRecord {
            id: None,
            remote_id: Some(RemoteImageId::new(7)),
            parent: Some(parent),
            filename: "img.png".to_string(),
            alt: None,
            featured: true,
            variant_key: None,
        };
        let id = store.import_image(b"png-bytes", &image).await.unwrap();
        store.attach_gallery_image(parent, id).await.unwrap();
        store.attach_gallery_image(parent, id).await.unwrap();
        assert_eq!(store.gallery_of(parent).await, vec![id]);
    }
}
