//! Commerce core configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BLOSSOM_API_BASE_URL` - Base URL of the remote shop service
//!   (e.g. `http://192.168.1.9:8000`)
//!
//! ## Optional
//! - `BLOSSOM_HTTP_TIMEOUT_SECS` - Per-request timeout in seconds (default: 30)

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default per-request HTTP timeout in seconds.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Commerce core configuration.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Base URL of the remote shop service. Always ends with a `/` so
    /// relative endpoint paths append cleanly.
    base_url: Url,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
}

impl ShopConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let raw = std::env::var("BLOSSOM_API_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("BLOSSOM_API_BASE_URL".to_string()))?;
        let base_url = parse_base_url(&raw)
            .map_err(|e| ConfigError::InvalidEnvVar("BLOSSOM_API_BASE_URL".to_string(), e))?;

        let http_timeout = match std::env::var("BLOSSOM_HTTP_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidEnvVar("BLOSSOM_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            base_url,
            http_timeout,
        })
    }

    /// Create a configuration directly from a base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL is not absolute
    /// `http`/`https`.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("base_url".to_string(), e))?;
        Ok(Self {
            base_url,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }

    /// The normalized base URL (always slash-terminated).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL for an endpoint path relative to the base URL.
    ///
    /// `path` must not start with `/`; the base URL is slash-terminated at
    /// construction so plain concatenation is correct.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Parse and normalize the base URL: must be absolute http(s), and the
/// stored form is slash-terminated.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme: {}", url.scheme()));
    }

    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }

    Ok(url)
}
