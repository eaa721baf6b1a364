//! Image download and import.
//!
//! Images are deduplicated by remote image ID: the same asset referenced by
//! several products (or by the featured slot and the gallery of one product)
//! is downloaded and stored exactly once. Image failures never escalate; the
//! caller logs them and carries on without the image.

use shopsync_core::{ImageId, ProductId, RemoteVariantId};
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::catalog::{CatalogError, CatalogStore, ImageRecord};
use crate::shopify::types::RemoteImage;
use crate::shopify::{ProductSource, ShopifyError};

/// File extensions accepted when deriving a filename from the source URL.
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Errors syncing a single image. Always image-local: callers treat any of
/// these as "no image".
#[derive(Debug, Error)]
pub enum ImageSyncError {
    #[error("image download failed: {0}")]
    Download(#[from] ShopifyError),
    #[error("image import failed: {0}")]
    Store(#[from] CatalogError),
}

/// Derive a storage filename from the source URL.
///
/// Takes the last path segment carrying an image extension; URLs without one
/// (CDN redirect endpoints, signed URLs with mangled paths) get a generated
/// name.
#[must_use]
pub fn derive_filename(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed.path_segments().and_then(|segments| {
                segments
                    .rev()
                    .find(|segment| has_image_extension(segment))
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| format!("shopify-img-{}.jpg", Uuid::new_v4()))
}

fn has_image_extension(segment: &str) -> bool {
    segment
        .rsplit_once('.')
        .is_some_and(|(name, ext)| {
            !name.is_empty()
                && IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Fetch and import one remote image, returning the local ID.
///
/// Short-circuits without downloading when an image with the same remote ID
/// was already imported, across products and across pages.
///
/// # Errors
///
/// Returns [`ImageSyncError`] on download or store failure.
pub async fn sync_image<S, C>(
    source: &S,
    catalog: &C,
    image: &RemoteImage,
    parent: Option<ProductId>,
    featured: bool,
    variant: Option<RemoteVariantId>,
) -> Result<ImageId, ImageSyncError>
where
    S: ProductSource + ?Sized,
    C: CatalogStore + ?Sized,
{
    if let Some(remote_id) = image.id {
        if let Some(existing) = catalog.find_image(remote_id).await? {
            debug!(%remote_id, %existing, "image already imported");
            return Ok(existing);
        }
    }

    let bytes = source.download_image(&image.src).await?;
    let record = ImageRecord {
        id: None,
        remote_id: image.id,
        parent,
        filename: derive_filename(&image.src),
        alt: image.alt.clone(),
        featured,
        variant_key: variant,
    };
    Ok(catalog.import_image(&bytes, &record).await?)
}
