//! Per-product reconciliation: map one remote product onto the local catalog.
//!
//! Outcomes are data, not exceptions. Everything that can go wrong below the
//! page level (an unsellable listing, a store write failure, a bad image) is
//! reported in the [`ReconcileReport`] and the sync moves on to the next
//! product; only page-level fetch failures surface above this module.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shopsync_core::{RemoteProductId, RemoteVariantId};
use tracing::{debug, instrument, warn};

use crate::catalog::{CatalogStore, ProductKind, ProductRecord, VariantRecord, VariationAxis};
use crate::shopify::ProductSource;
use crate::shopify::types::{RemoteProduct, RemoteVariant, TITLE_AXIS};

use super::images::sync_image;

/// What happened to one remote product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A new local product was created.
    Created,
    /// An existing local product was refreshed.
    Updated,
    /// The payload carried no variants at all (deleted listing artifact).
    SkippedNoVariants,
    /// No variant is sellable; out-of-stock listings are not mirrored.
    SkippedNotSellable,
    /// The product could not be written; the reason is carried for the page
    /// summary. Siblings on the page are unaffected.
    Failed(String),
}

/// Reconciliation result for one remote product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    /// Variants skipped as unsellable or lost to a per-variant write failure.
    pub failed_variants: u32,
}

impl ReconcileReport {
    const fn outcome(outcome: ReconcileOutcome) -> Self {
        Self {
            outcome,
            failed_variants: 0,
        }
    }

    fn failed(reason: String) -> Self {
        Self::outcome(ReconcileOutcome::Failed(reason))
    }
}

/// Reconcile one remote product against the local catalog.
///
/// Infallible by contract: every failure mode is folded into the report.
#[instrument(skip_all, fields(remote_id = %remote.id, title = %remote.title))]
pub(crate) async fn reconcile<S, C>(
    source: &S,
    catalog: &C,
    remote: &RemoteProduct,
    sync_images: bool,
    now: DateTime<Utc>,
) -> ReconcileReport
where
    S: ProductSource + ?Sized,
    C: CatalogStore + ?Sized,
{
    if remote.variants.is_empty() {
        debug!("no variants, skipping");
        return ReconcileReport::outcome(ReconcileOutcome::SkippedNoVariants);
    }
    if !remote.has_sellable_variant() {
        debug!("no sellable variant, skipping");
        return ReconcileReport::outcome(ReconcileOutcome::SkippedNotSellable);
    }

    // Existing record, if this remote product was synced before.
    let existing = match catalog.find_product(remote.id).await {
        Ok(Some(id)) => match catalog.load_product(id).await {
            Ok(record) => record,
            Err(err) => return ReconcileReport::failed(err.to_string()),
        },
        Ok(None) => None,
        Err(err) => return ReconcileReport::failed(err.to_string()),
    };

    // The simple/variable decision is made once, on the create path. A
    // listing that changes shape later is rejected rather than silently
    // migrated between kinds.
    let kind = derive_kind(remote);
    if let Some(previous) = &existing {
        if previous.kind.tag() != kind.tag() {
            return ReconcileReport::failed(format!(
                "product kind changed for remote {}: {} -> {}",
                remote.id,
                previous.kind.tag(),
                kind.tag()
            ));
        }
    }

    let mut record = ProductRecord {
        id: existing.as_ref().and_then(|record| record.id),
        remote_id: remote.id,
        name: remote.title.clone(),
        description: remote.body_html.clone().unwrap_or_default(),
        slug: derive_slug(&remote.title, remote.id),
        tags: remote.tag_list(),
        featured_image: existing.as_ref().and_then(|record| record.featured_image),
        last_synced: now,
        kind,
    };

    if sync_images {
        if let Some(image) = &remote.image {
            match sync_image(source, catalog, image, record.id, true, None).await {
                Ok(id) => record.featured_image = Some(id),
                Err(err) => warn!(error = %err, "featured image sync failed"),
            }
        }
    }

    let parent = match catalog.upsert_product(&record).await {
        Ok(id) if id.as_i64() > 0 => id,
        Ok(id) => {
            return ReconcileReport::failed(format!("store returned non-positive id {id}"));
        }
        Err(err) => return ReconcileReport::failed(err.to_string()),
    };
    let created = existing.is_none();

    // Variants, each on its own: one bad variant never takes down the rest.
    let mut failed_variants = 0u32;
    let mut keep: Vec<RemoteVariantId> = Vec::with_capacity(remote.variants.len());
    for variant in &remote.variants {
        if !variant.is_sellable() {
            debug!(remote_variant = %variant.id, "variant unsellable, skipping");
            failed_variants += 1;
            continue;
        }

        // A mapping that points at a record the store can no longer load is
        // treated as not-found; the upsert below heals it.
        let variant_id = match catalog.find_variant(parent, variant.id).await {
            Ok(Some(id)) => match catalog.load_variant(id).await {
                Ok(Some(loaded)) => loaded.id,
                Ok(None) | Err(_) => None,
            },
            Ok(None) | Err(_) => None,
        };

        let (regular_price, sale_price) =
            split_sale_price(variant.price, variant.compare_at_price);
        let manage_stock = variant.inventory_management.is_some();

        let mut variant_record = VariantRecord {
            id: variant_id,
            parent,
            remote_id: variant.id,
            attributes: variant_attributes(remote, variant),
            regular_price,
            sale_price,
            sku: variant.sku.clone(),
            manage_stock,
            stock_quantity: manage_stock.then_some(variant.inventory_quantity),
            in_stock: true,
            image: None,
            last_synced: now,
        };

        if sync_images {
            if let Some(image) = remote.image_for_variant(variant) {
                match sync_image(source, catalog, image, Some(parent), false, Some(variant.id))
                    .await
                {
                    Ok(id) => variant_record.image = Some(id),
                    Err(err) => warn!(error = %err, "variant image sync failed"),
                }
            }
        }

        match catalog.upsert_variant(&variant_record).await {
            Ok(_) => keep.push(variant.id),
            Err(err) => {
                warn!(remote_variant = %variant.id, error = %err, "variant write failed");
                failed_variants += 1;
                // Keep the previously-synced record rather than pruning it
                // over a transient write failure.
                keep.push(variant.id);
            }
        }
    }

    if sync_images {
        for image in &remote.images {
            match sync_image(source, catalog, image, Some(parent), false, None).await {
                Ok(id) => {
                    if let Err(err) = catalog.attach_gallery_image(parent, id).await {
                        warn!(error = %err, "gallery attach failed");
                    }
                }
                Err(err) => warn!(error = %err, "gallery image sync failed"),
            }
        }
    }

    // Remote variants that disappeared since the last pass are pruned.
    if let Err(err) = catalog.prune_variants(parent, &keep).await {
        warn!(error = %err, "orphan variant pruning failed");
    }

    ReconcileReport {
        outcome: if created {
            ReconcileOutcome::Created
        } else {
            ReconcileOutcome::Updated
        },
        failed_variants,
    }
}

// ======================== Pure mapping helpers ========================

fn derive_kind(remote: &RemoteProduct) -> ProductKind {
    if remote.is_variable() {
        ProductKind::Variable {
            axes: derive_axes(remote),
        }
    } else {
        ProductKind::Simple {
            sku: remote
                .variants
                .first()
                .and_then(|variant| variant.sku.clone()),
        }
    }
}

/// Variation axes from the option list, placeholders dropped.
pub(crate) fn derive_axes(remote: &RemoteProduct) -> Vec<VariationAxis> {
    remote
        .variation_axes()
        .into_iter()
        .enumerate()
        .map(|(position, option)| VariationAxis {
            name: option.name.clone(),
            position: position as i32,
            values: option.values.clone(),
        })
        .collect()
}

/// Slug from the title: lowercased, non-alphanumeric runs collapsed to `-`.
/// Empty titles fall back to `product-{remote_id}`.
pub(crate) fn derive_slug(title: &str, remote_id: RemoteProductId) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        format!("product-{remote_id}")
    } else {
        slug.to_string()
    }
}

/// Split the remote price pair into regular/sale prices.
///
/// A compare-at price above the listed price means the listing is on sale:
/// compare-at becomes the regular price and the listed price the sale price.
/// Otherwise the listed price is the regular price and there is no sale.
pub(crate) fn split_sale_price(
    price: Decimal,
    compare_at: Option<Decimal>,
) -> (Decimal, Option<Decimal>) {
    match compare_at {
        Some(compare_at) if compare_at > price => (compare_at, Some(price)),
        _ => (price, None),
    }
}

/// Zip a variant's option values with the parent's real axes.
///
/// `option1..option3` align positionally with the full option list, so the
/// pairing walks the unfiltered list and drops placeholder axes afterwards.
pub(crate) fn variant_attributes(
    remote: &RemoteProduct,
    variant: &RemoteVariant,
) -> Vec<(String, String)> {
    let values = [&variant.option1, &variant.option2, &variant.option3];
    remote
        .options
        .iter()
        .enumerate()
        .filter(|(_, option)| option.name != TITLE_AXIS && !option.values.is_empty())
        .filter_map(|(index, option)| {
            values
                .get(index)
                .and_then(|value| value.as_ref())
                .map(|value| (option.name.clone(), value.clone()))
        })
        .collect()
}
