//! Unified error handling for the cart library.
//!
//! Nothing in this subsystem is fatal to the application. Local synchronous
//! failures never reach callers (storage trouble degrades to an empty cart);
//! remote failures surface only through the returned `Result`, which callers
//! may notify on or ignore per their retry policy.

use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Failures a cart operation can surface to callers.
#[derive(Debug, Error)]
pub enum CartError {
    /// Remote gateway operation failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Durable slot write failed where a caller asked for strict persistence.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
