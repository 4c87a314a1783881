//! Cart library configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `KUPPAM_API_BASE_URL` - Base URL of the storefront REST API
//!
//! ## Optional
//! - `KUPPAM_STORAGE_DIR` - Directory for durable local slots (default: `.kuppam`)
//! - `KUPPAM_CART_STALE_SECS` - Seconds the cached server cart stays fresh (default: 60)
//! - `KUPPAM_HTTP_TIMEOUT_SECS` - HTTP request timeout in seconds (default: 30)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_DIR: &str = ".kuppam";
const DEFAULT_CART_STALE_SECS: u64 = 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart library configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Base URL of the storefront REST API.
    pub api_base_url: Url,
    /// Directory holding the durable local slots (cart, token).
    pub storage_dir: PathBuf,
    /// How long the cached server cart stays fresh.
    pub cart_stale: Duration,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
}

impl CartConfig {
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_base_url = lookup("KUPPAM_API_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("KUPPAM_API_BASE_URL".to_string()))?;
        let api_base_url = Url::parse(&raw_base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("KUPPAM_API_BASE_URL".to_string(), e.to_string())
        })?;

        let storage_dir = lookup("KUPPAM_STORAGE_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR), PathBuf::from);

        let cart_stale = get_secs(&lookup, "KUPPAM_CART_STALE_SECS", DEFAULT_CART_STALE_SECS)?;
        let http_timeout = get_secs(&lookup, "KUPPAM_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        Ok(Self {
            api_base_url,
            storage_dir,
            cart_stale,
            http_timeout,
        })
    }
}

/// Parse an optional seconds variable, falling back to a default.
fn get_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let secs = match lookup(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}
