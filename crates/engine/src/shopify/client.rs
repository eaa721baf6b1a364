//! Authenticated REST client for the Shopify Admin API.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use shopsync_core::SyncCursor;
use tracing::{debug, instrument};
use url::Url;

use crate::config::SyncConfig;

use super::types::{ProductPage, RemoteProduct, Shop};
use super::{ProductSource, ShopifyError};

/// Authentication header carrying the Admin API access token.
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Timeout for API calls.
const API_TIMEOUT: Duration = Duration::from_secs(45);

/// Timeout for image downloads; large media need more headroom than API calls.
const MEDIA_TIMEOUT: Duration = Duration::from_secs(120);

/// Matches the `rel="next"` entry of a `Link` pagination header.
static NEXT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<([^>]+)>;\s*rel="next""#).expect("valid literal regex"));

/// Extract the full URL of the next page from a `Link` header value.
///
/// Returns `None` when the header has no `rel="next"` entry, which means
/// pagination is exhausted.
#[must_use]
pub fn next_page_url(link_header: &str) -> Option<&str> {
    NEXT_LINK
        .captures(link_header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Extract the opaque `page_info` cursor token from a next-page URL.
#[must_use]
pub fn page_info_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "page_info")
        .map(|(_, value)| value.into_owned())
}

/// Body envelope of `products.json`.
#[derive(Debug, Deserialize)]
struct ProductListing {
    products: Vec<RemoteProduct>,
}

/// Body envelope of `shop.json`.
#[derive(Debug, Deserialize)]
struct ShopEnvelope {
    shop: Shop,
}

/// REST client for the Shopify Admin API.
///
/// Side-effect free beyond the network calls themselves; no state is mutated
/// between requests.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    media_http: reqwest::Client,
    shop_domain: String,
    api_version: String,
    access_token: SecretString,
}

impl RestClient {
    /// Create a new client from the sync configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Transport`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: &SyncConfig) -> Result<Self, ShopifyError> {
        let http = reqwest::Client::builder().timeout(API_TIMEOUT).build()?;
        let media_http = reqwest::Client::builder().timeout(MEDIA_TIMEOUT).build()?;

        Ok(Self {
            http,
            media_http,
            shop_domain: config.shop_domain.clone(),
            api_version: config.api_version.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// Fail fast when either credential is missing, before any network call.
    fn ensure_credentials(&self) -> Result<&str, ShopifyError> {
        if self.shop_domain.is_empty() {
            return Err(ShopifyError::Configuration(
                "shop domain is not set".to_string(),
            ));
        }
        let token = self.access_token.expose_secret();
        if token.is_empty() {
            return Err(ShopifyError::Configuration(
                "access token is not set".to_string(),
            ));
        }
        Ok(token)
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "https://{}/admin/api/{}/{}",
            self.shop_domain,
            self.api_version,
            endpoint.trim_start_matches('/')
        )
    }

    /// GET an endpoint and decode its body, returning the `Link` header too.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<(T, Option<String>), ShopifyError> {
        let token = self.ensure_credentials()?;
        let url = self.endpoint_url(endpoint);

        let response = self
            .http
            .get(&url)
            .header(ACCESS_TOKEN_HEADER, token)
            .header(header::CONTENT_TYPE, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let link = response
            .headers()
            .get(header::LINK)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let body = response.text().await?;

        if !status.is_success() {
            let errors = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|value| value.get("errors").cloned());
            return Err(ShopifyError::Remote {
                status: status.as_u16(),
                errors,
            });
        }

        let decoded = serde_json::from_str::<T>(&body)?;
        Ok((decoded, link))
    }

    /// Probe the API with the minimal-permission `shop.json` endpoint.
    ///
    /// # Errors
    ///
    /// Returns a [`ShopifyError`] when credentials are missing or the call
    /// fails; the error classification tells the caller what to fix.
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> Result<Shop, ShopifyError> {
        let (envelope, _) = self.get_json::<ShopEnvelope>("shop.json", &[]).await?;
        Ok(envelope.shop)
    }
}

#[async_trait]
impl ProductSource for RestClient {
    #[instrument(skip(self), fields(shop = %self.shop_domain))]
    async fn fetch_page(
        &self,
        limit: u32,
        cursor: &SyncCursor,
    ) -> Result<ProductPage, ShopifyError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(page_info) = cursor.as_page_info() {
            query.push(("page_info", page_info.to_string()));
        }

        let (listing, link) = self
            .get_json::<ProductListing>("products.json", &query)
            .await?;

        let next_page_info = link
            .as_deref()
            .and_then(next_page_url)
            .and_then(page_info_from_url);

        debug!(
            count = listing.products.len(),
            has_next = next_page_info.is_some(),
            "fetched product page"
        );

        Ok(ProductPage {
            products: listing.products,
            next_page_info,
        })
    }

    #[instrument(skip(self))]
    async fn download_image(&self, url: &str) -> Result<Bytes, ShopifyError> {
        let response = self.media_http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ShopifyError::Remote {
                status: status.as_u16(),
                errors: None,
            });
        }
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LINK_WITH_NEXT: &str = "<https://test.myshopify.com/admin/api/2024-04/products.json?limit=10&page_info=eyJsYXN0X2lkIjo0fQ>; rel=\"next\"";
    const LINK_BOTH: &str = "<https://test.myshopify.com/admin/api/2024-04/products.json?page_info=prevtok&limit=10>; rel=\"previous\", <https://test.myshopify.com/admin/api/2024-04/products.json?page_info=nexttok&limit=10>; rel=\"next\"";
    const LINK_PREVIOUS_ONLY: &str = "<https://test.myshopify.com/admin/api/2024-04/products.json?page_info=prevtok&limit=10>; rel=\"previous\"";

    #[test]
    fn test_next_page_url_single_entry() {
        let url = next_page_url(LINK_WITH_NEXT).unwrap();
        assert!(url.starts_with("https://test.myshopify.com/"));
        assert!(url.contains("page_info=eyJsYXN0X2lkIjo0fQ"));
    }

    #[test]
    fn test_next_page_url_skips_previous_relation() {
        let url = next_page_url(LINK_BOTH).unwrap();
        assert!(url.contains("page_info=nexttok"));
    }

    #[test]
    fn test_next_page_url_absent() {
        assert!(next_page_url(LINK_PREVIOUS_ONLY).is_none());
        assert!(next_page_url("").is_none());
    }

    #[test]
    fn test_page_info_from_url() {
        assert_eq!(
            page_info_from_url(
                "https://test.myshopify.com/admin/api/2024-04/products.json?limit=10&page_info=tok123"
            ),
            Some("tok123".to_string())
        );
        assert_eq!(
            page_info_from_url("https://test.myshopify.com/admin/api/2024-04/products.json"),
            None
        );
        assert_eq!(page_info_from_url("not a url"), None);
    }

    #[test]
    fn test_link_header_to_cursor_token() {
        let token = next_page_url(LINK_WITH_NEXT)
            .and_then(page_info_from_url)
            .unwrap();
        assert_eq!(token, "eyJsYXN0X2lkIjo0fQ");
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_network() {
        let config = SyncConfig {
            shop_domain: String::new(),
            access_token: SecretString::from(""),
            api_key: None,
            api_version: "2024-04".to_string(),
            page_size: 10,
            sync_images: false,
            database_url: "sqlite::memory:".to_string(),
            media_dir: std::path::PathBuf::from("./media"),
        };
        let client = RestClient::new(&config).unwrap();
        let result = client.fetch_page(10, &SyncCursor::Start).await;
        assert!(matches!(result, Err(ShopifyError::Configuration(_))));
    }
}
