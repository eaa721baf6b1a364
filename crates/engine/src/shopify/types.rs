//! Remote product schema for the Shopify Admin REST API.
//!
//! Payloads are parsed with validation at the client boundary: a body that
//! does not match this schema is a parse error for the whole page rather than
//! a missing-field `null` propagating into reconciliation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopsync_core::{RemoteImageId, RemoteProductId, RemoteVariantId};

/// Shopify's "no real variation" placeholder option axis name.
pub(crate) const TITLE_AXIS: &str = "Title";

/// Inventory tracking mode value meaning "tracked by Shopify itself".
const SHOPIFY_MANAGED: &str = "shopify";

/// One page of the remote product listing, with the cursor extracted from the
/// `Link` response header.
#[derive(Debug, Clone)]
pub struct ProductPage {
    /// Products in API response order.
    pub products: Vec<RemoteProduct>,
    /// Opaque `page_info` token for the next page, if any.
    pub next_page_info: Option<String>,
}

/// A product as returned by `products.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProduct {
    /// Remote product ID (the reconciliation key).
    pub id: RemoteProductId,
    /// Product title.
    pub title: String,
    /// HTML description.
    #[serde(default)]
    pub body_html: Option<String>,
    /// Comma-separated tag string.
    #[serde(default)]
    pub tags: String,
    /// Named option axes (e.g., Size, Color).
    #[serde(default)]
    pub options: Vec<RemoteOption>,
    /// Primary image.
    #[serde(default)]
    pub image: Option<RemoteImage>,
    /// Gallery images (includes the primary).
    #[serde(default)]
    pub images: Vec<RemoteImage>,
    /// Variants; Shopify always materializes at least a default variant for
    /// live products, but deleted listings can come back empty.
    #[serde(default)]
    pub variants: Vec<RemoteVariant>,
}

/// A named option axis with its value list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteOption {
    /// Axis name; `"Title"` means the product has no real variation.
    pub name: String,
    /// 1-based axis position.
    #[serde(default)]
    pub position: Option<i32>,
    /// Values along this axis.
    #[serde(default)]
    pub values: Vec<String>,
}

/// Inventory policy when quantity reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InventoryPolicy {
    /// Stop selling when out of stock.
    Deny,
    /// Keep selling (oversell allowed).
    #[default]
    Continue,
}

/// A product variant as returned by `products.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteVariant {
    /// Remote variant ID (the reconciliation key).
    pub id: RemoteVariantId,
    /// Owning remote product ID.
    #[serde(default)]
    pub product_id: Option<RemoteProductId>,
    /// Variant title (combination of option values).
    #[serde(default)]
    pub title: Option<String>,
    /// SKU code.
    #[serde(default)]
    pub sku: Option<String>,
    /// Listed price. Shopify sends prices as decimal strings; the original
    /// representation is preserved.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    /// Pre-discount price, when the variant is on sale.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub compare_at_price: Option<Decimal>,
    /// Value along the first option axis.
    #[serde(default)]
    pub option1: Option<String>,
    /// Value along the second option axis.
    #[serde(default)]
    pub option2: Option<String>,
    /// Value along the third option axis.
    #[serde(default)]
    pub option3: Option<String>,
    /// Inventory tracking mode; `"shopify"` means platform-tracked.
    #[serde(default)]
    pub inventory_management: Option<String>,
    /// What happens at zero quantity.
    #[serde(default)]
    pub inventory_policy: InventoryPolicy,
    /// Quantity on hand.
    #[serde(default)]
    pub inventory_quantity: i64,
    /// Image assigned to this variant, if any.
    #[serde(default)]
    pub image_id: Option<RemoteImageId>,
}

/// A product image as returned by `products.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteImage {
    /// Remote image ID (the dedup key); absent on some legacy payloads.
    #[serde(default)]
    pub id: Option<RemoteImageId>,
    /// Source URL of the binary.
    pub src: String,
    /// Alt text.
    #[serde(default)]
    pub alt: Option<String>,
    /// Variants this image is assigned to.
    #[serde(default)]
    pub variant_ids: Vec<RemoteVariantId>,
}

/// Shop details from `shop.json`, used by the connection test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    /// Shop display name.
    pub name: String,
    /// Canonical myshopify domain.
    #[serde(default)]
    pub myshopify_domain: Option<String>,
    /// Shop contact email.
    #[serde(default)]
    pub email: Option<String>,
}

impl RemoteVariant {
    /// Whether this variant can currently be sold.
    ///
    /// A variant is sellable unless Shopify itself tracks its inventory, the
    /// policy denies overselling, AND the quantity is zero or negative. This
    /// is the guard against mirroring out-of-stock or deleted listings.
    #[must_use]
    pub fn is_sellable(&self) -> bool {
        !(self.inventory_management.as_deref() == Some(SHOPIFY_MANAGED)
            && self.inventory_policy == InventoryPolicy::Deny
            && self.inventory_quantity <= 0)
    }
}

impl RemoteProduct {
    /// Whether any variant is sellable.
    #[must_use]
    pub fn has_sellable_variant(&self) -> bool {
        self.variants.iter().any(RemoteVariant::is_sellable)
    }

    /// Whether this product maps to a variable local product.
    ///
    /// True iff the product has more than one variant, or its first option
    /// axis is a real one: named something other than `"Title"` and carrying
    /// at least one value.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.variants.len() > 1
            || self
                .options
                .first()
                .is_some_and(|option| option.name != TITLE_AXIS && !option.values.is_empty())
    }

    /// The option axes that represent real variation, in position order.
    ///
    /// Axes named `"Title"` or without values are placeholders and are
    /// dropped.
    #[must_use]
    pub fn variation_axes(&self) -> Vec<&RemoteOption> {
        self.options
            .iter()
            .filter(|option| option.name != TITLE_AXIS && !option.values.is_empty())
            .collect()
    }

    /// The comma-separated tag string split into trimmed, non-empty tags.
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Find the gallery image a variant points at through its `image_id`.
    #[must_use]
    pub fn image_for_variant(&self, variant: &RemoteVariant) -> Option<&RemoteImage> {
        let wanted = variant.image_id?;
        self.images.iter().find(|image| image.id == Some(wanted))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse_product(json: &str) -> RemoteProduct {
        serde_json::from_str(json).unwrap()
    }

    fn sample_product() -> RemoteProduct {
        parse_product(
            r#"{
                "id": 632910392,
                "title": "IPod Nano - 8GB",
                "body_html": "<p>It's the small iPod with a big idea.</p>",
                "tags": "Emotive, Flash Memory, MP3, Music",
                "options": [
                    {"name": "Color", "position": 1, "values": ["Pink", "Red"]}
                ],
                "image": {"id": 850703190, "src": "https://cdn.shopify.com/s/files/ipod-nano.png"},
                "images": [
                    {"id": 850703190, "src": "https://cdn.shopify.com/s/files/ipod-nano.png"}
                ],
                "variants": [
                    {
                        "id": 808950810,
                        "product_id": 632910392,
                        "title": "Pink",
                        "sku": "IPOD2008PINK",
                        "price": "199.00",
                        "compare_at_price": null,
                        "option1": "Pink",
                        "inventory_management": "shopify",
                        "inventory_policy": "continue",
                        "inventory_quantity": 10,
                        "image_id": 850703190
                    },
                    {
                        "id": 808950811,
                        "product_id": 632910392,
                        "title": "Red",
                        "sku": "IPOD2008RED",
                        "price": "199.00",
                        "compare_at_price": "249.00",
                        "option1": "Red",
                        "inventory_management": "shopify",
                        "inventory_policy": "deny",
                        "inventory_quantity": 0
                    }
                ]
            }"#,
        )
    }

    #[test]
    fn test_deserialize_preserves_price_scale() {
        let product = sample_product();
        let first = &product.variants[0];
        assert_eq!(first.price.to_string(), "199.00");
        assert_eq!(
            product.variants[1].compare_at_price.unwrap().to_string(),
            "249.00"
        );
    }

    #[test]
    fn test_sellability_rule() {
        let product = sample_product();
        // continue policy: sellable regardless of quantity
        assert!(product.variants[0].is_sellable());
        // shopify-managed + deny + zero quantity: not sellable
        assert!(!product.variants[1].is_sellable());
        assert!(product.has_sellable_variant());
    }

    #[test]
    fn test_sellable_when_unmanaged() {
        let mut product = sample_product();
        product.variants[1].inventory_management = None;
        assert!(product.variants[1].is_sellable());
    }

    #[test]
    fn test_sellable_when_restocked() {
        let mut product = sample_product();
        product.variants[1].inventory_quantity = 1;
        assert!(product.variants[1].is_sellable());
    }

    #[test]
    fn test_variable_with_real_axis() {
        let product = sample_product();
        assert!(product.is_variable());
        let axes = product.variation_axes();
        assert_eq!(axes.len(), 1);
        assert_eq!(axes[0].name, "Color");
    }

    #[test]
    fn test_title_axis_single_variant_is_simple() {
        let product = parse_product(
            r#"{
                "id": 1,
                "title": "Plain Mug",
                "options": [{"name": "Title", "position": 1, "values": ["Default Title"]}],
                "variants": [{"id": 11, "price": "12.50", "option1": "Default Title"}]
            }"#,
        );
        assert!(!product.is_variable());
        assert!(product.variation_axes().is_empty());
    }

    #[test]
    fn test_two_variants_is_variable_even_with_title_axis() {
        let product = parse_product(
            r#"{
                "id": 2,
                "title": "Two Mugs",
                "options": [{"name": "Title", "values": ["A", "B"]}],
                "variants": [
                    {"id": 21, "price": "10.00", "option1": "A"},
                    {"id": 22, "price": "10.00", "option1": "B"}
                ]
            }"#,
        );
        assert!(product.is_variable());
    }

    #[test]
    fn test_tag_list_trims_and_drops_empty() {
        let product = sample_product();
        assert_eq!(
            product.tag_list(),
            vec!["Emotive", "Flash Memory", "MP3", "Music"]
        );

        let untagged = parse_product(
            r#"{"id": 3, "title": "Untagged", "variants": [{"id": 31, "price": "1.00"}]}"#,
        );
        assert!(untagged.tag_list().is_empty());
    }

    #[test]
    fn test_image_for_variant() {
        let product = sample_product();
        let with_image = &product.variants[0];
        assert_eq!(
            product.image_for_variant(with_image).unwrap().id,
            Some(shopsync_core::RemoteImageId::new(850_703_190))
        );
        let without_image = &product.variants[1];
        assert!(product.image_for_variant(without_image).is_none());
    }

    #[test]
    fn test_missing_required_field_is_a_parse_error() {
        // No `id` field: the page fails validation instead of yielding nulls.
        let result: Result<RemoteProduct, _> =
            serde_json::from_str(r#"{"title": "No ID", "variants": []}"#);
        assert!(result.is_err());
    }
}
