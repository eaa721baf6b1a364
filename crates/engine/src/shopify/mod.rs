//! Shopify Admin REST client and the validated remote schema.
//!
//! # Authentication
//!
//! All calls go to `https://{domain}/admin/api/{version}/{endpoint}` with the
//! Admin API access token in the `X-Shopify-Access-Token` header. The legacy
//! API key is never used for authentication (it exists in the configuration
//! for display only).
//!
//! # Pagination
//!
//! Shopify communicates cursor pagination through the `Link` response header:
//! a `rel="next"` entry carries the URL of the following page, whose
//! `page_info` query parameter is the opaque cursor token. No `next` relation
//! means the listing is exhausted.

mod client;
pub mod types;

pub use client::{RestClient, next_page_url, page_info_from_url};
pub use types::{
    InventoryPolicy, ProductPage, RemoteImage, RemoteOption, RemoteProduct, RemoteVariant, Shop,
};

use async_trait::async_trait;
use bytes::Bytes;
use shopsync_core::SyncCursor;
use thiserror::Error;

/// Errors that can occur when talking to the Shopify Admin API.
///
/// All variants are page-fatal at worst: the orchestrator reports them and
/// leaves the cursor unchanged so the same page is retried on the next run.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// Shop domain or access token missing; no network call was attempted.
    #[error("Shopify credentials not configured: {0}")]
    Configuration(String),

    /// Connection, DNS, or timeout failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response from the API, with any structured error payload.
    #[error("Shopify API error: status {status}{}", format_remote_errors(.errors))]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Decoded `errors` field from the response body, when present.
        errors: Option<serde_json::Value>,
    },

    /// Response body failed schema validation.
    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

fn format_remote_errors(errors: &Option<serde_json::Value>) -> String {
    errors
        .as_ref()
        .map_or_else(String::new, |e| format!(" - {e}"))
}

/// Source of paginated remote products and image bytes.
///
/// Implemented by [`RestClient`]; test suites substitute scripted sources so
/// the orchestrator and reconciliation engine run without a network.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Fetch one page of products at the given cursor position.
    ///
    /// The pagination parameter is omitted when the cursor is
    /// [`SyncCursor::Start`].
    ///
    /// # Errors
    ///
    /// Returns a [`ShopifyError`] classified as configuration, transport,
    /// remote, or parse failure. All are page-fatal, none process-fatal.
    async fn fetch_page(&self, limit: u32, cursor: &SyncCursor)
    -> Result<ProductPage, ShopifyError>;

    /// Download an image binary. Bounded by a longer timeout than API calls;
    /// large media need headroom.
    ///
    /// # Errors
    ///
    /// Returns a [`ShopifyError`] on download failure; callers treat it as
    /// "no image".
    async fn download_image(&self, url: &str) -> Result<Bytes, ShopifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = ShopifyError::Configuration("missing access token".to_string());
        assert_eq!(
            err.to_string(),
            "Shopify credentials not configured: missing access token"
        );
    }

    #[test]
    fn test_remote_error_display_with_payload() {
        let err = ShopifyError::Remote {
            status: 429,
            errors: Some(serde_json::json!("Exceeded 2 calls per second")),
        };
        assert_eq!(
            err.to_string(),
            "Shopify API error: status 429 - \"Exceeded 2 calls per second\""
        );
    }

    #[test]
    fn test_remote_error_display_without_payload() {
        let err = ShopifyError::Remote {
            status: 500,
            errors: None,
        };
        assert_eq!(err.to_string(), "Shopify API error: status 500");
    }
}
