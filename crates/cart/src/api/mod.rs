//! Typed clients for the storefront REST API.
//!
//! # Architecture
//!
//! - The backend is the source of truth for the authenticated cart - no
//!   local sync, direct API calls
//! - Clients are stateless request/response mappers; all cart policy lives
//!   in the engine
//! - The bearer credential is read from the injected session signal per
//!   request, and an authorization-denied response clears it
//!
//! # Surface
//!
//! - [`CartApi`] - `GET/POST/DELETE /cart`, `PUT/DELETE /cart/item/{id}`
//! - [`AuthApi`] / [`AuthService`] - `POST /auth/login`, `POST /auth/signup`

mod conversions;

pub mod auth;
pub mod cart;

pub use auth::{AuthApi, AuthService};
pub use cart::CartApi;

use thiserror::Error;

/// Errors that can occur when talking to the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Credential missing, expired, or rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Failed to parse a response body.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Map a non-success response to the matching `ApiError`.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(ApiError::RateLimited(retry_after));
    }

    let message = response.text().await.unwrap_or_default();
    match status {
        reqwest::StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        reqwest::StatusCode::NOT_FOUND => Err(ApiError::NotFound(message)),
        _ => Err(ApiError::Api {
            status: status.as_u16(),
            message,
        }),
    }
}

/// Normalize a base URL for path concatenation.
pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
