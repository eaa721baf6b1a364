//! Sync configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPSYNC_SHOP_DOMAIN` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPSYNC_ACCESS_TOKEN` - Admin API access token (sent as `X-Shopify-Access-Token`)
//!
//! ## Optional
//! - `SHOPSYNC_API_KEY` - legacy API key; shown in diagnostics, never used for auth
//! - `SHOPSYNC_API_VERSION` - Admin API version (default: 2024-04)
//! - `SHOPSYNC_PAGE_SIZE` - products per page, clamped to [5, 250] (default: 10)
//! - `SHOPSYNC_SYNC_IMAGES` - download and attach product images (default: false)
//! - `SHOPSYNC_DATABASE_URL` - `SQLite` URL for catalog/state (default: sqlite://shopsync.db)
//! - `SHOPSYNC_MEDIA_DIR` - directory for downloaded image files (default: ./media)

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const DEFAULT_API_VERSION: &str = "2024-04";
const DEFAULT_PAGE_SIZE: u32 = 10;

/// Bounds Shopify enforces on the `limit` query parameter.
pub const MIN_PAGE_SIZE: u32 = 5;
/// Upper bound of the `limit` query parameter.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Sync engine configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct SyncConfig {
    /// Shopify store domain (e.g., your-store.myshopify.com)
    pub shop_domain: String,
    /// Admin API access token (the only credential used for authentication)
    pub access_token: SecretString,
    /// Legacy API key. Kept for display in diagnostics only; authentication
    /// always goes through the access token header.
    pub api_key: Option<String>,
    /// Admin API version path segment (e.g., 2024-04)
    pub api_version: String,
    /// Products fetched per page, within [`MIN_PAGE_SIZE`, `MAX_PAGE_SIZE`]
    pub page_size: u32,
    /// Whether to download and attach product images during sync
    pub sync_images: bool,
    /// `SQLite` database URL for the catalog and sync state
    pub database_url: String,
    /// Directory where downloaded image files are written
    pub media_dir: PathBuf,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[REDACTED]")
            .field("api_key", &self.api_key)
            .field("api_version", &self.api_version)
            .field("page_size", &self.page_size)
            .field("sync_images", &self.sync_images)
            .field("database_url", &self.database_url)
            .field("media_dir", &self.media_dir)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let shop_domain = get_required_env("SHOPSYNC_SHOP_DOMAIN")?;
        let access_token = SecretString::from(get_required_env("SHOPSYNC_ACCESS_TOKEN")?);
        let api_key = get_optional_env("SHOPSYNC_API_KEY");
        let api_version = get_env_or_default("SHOPSYNC_API_VERSION", DEFAULT_API_VERSION);

        let page_size = match get_optional_env("SHOPSYNC_PAGE_SIZE") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidEnvVar("SHOPSYNC_PAGE_SIZE".to_string(), e.to_string())
            })?,
            None => DEFAULT_PAGE_SIZE,
        };

        let sync_images = match get_optional_env("SHOPSYNC_SYNC_IMAGES") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "SHOPSYNC_SYNC_IMAGES".to_string(),
                    format!("expected true/false, got {raw:?}"),
                )
            })?,
            None => false,
        };

        let database_url = get_env_or_default("SHOPSYNC_DATABASE_URL", "sqlite://shopsync.db");
        let media_dir = PathBuf::from(get_env_or_default("SHOPSYNC_MEDIA_DIR", "./media"));

        Ok(Self {
            shop_domain,
            access_token,
            api_key,
            api_version,
            page_size: page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
            sync_images,
            database_url,
            media_dir,
        })
    }

    /// Page size clamped into the bounds Shopify accepts.
    ///
    /// Defensive re-clamp for hand-constructed configs; `from_env` already
    /// clamps on load.
    #[must_use]
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// Whether both credentials needed for an API call are present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.shop_domain.is_empty() && !self.access_token.expose_secret().is_empty()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> SyncConfig {
        SyncConfig {
            shop_domain: "test.myshopify.com".to_string(),
            access_token: SecretString::from("shpat_test_token"),
            api_key: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            sync_images: false,
            database_url: "sqlite::memory:".to_string(),
            media_dir: PathBuf::from("./media"),
        }
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_effective_page_size_clamps() {
        let mut config = test_config();
        config.page_size = 1;
        assert_eq!(config.effective_page_size(), MIN_PAGE_SIZE);
        config.page_size = 1000;
        assert_eq!(config.effective_page_size(), MAX_PAGE_SIZE);
        config.page_size = 50;
        assert_eq!(config.effective_page_size(), 50);
    }

    #[test]
    fn test_has_credentials() {
        let config = test_config();
        assert!(config.has_credentials());

        let mut missing_domain = test_config();
        missing_domain.shop_domain = String::new();
        assert!(!missing_domain.has_credentials());

        let mut missing_token = test_config();
        missing_token.access_token = SecretString::from("");
        assert!(!missing_token.has_credentials());
    }

    #[test]
    fn test_debug_redacts_access_token() {
        let config = test_config();
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("test.myshopify.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("shpat_test_token"));
    }
}
