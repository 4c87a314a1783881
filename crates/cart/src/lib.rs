//! Kuppam cart reconciliation library.
//!
//! Keeps a shopping cart consistent across an anonymous, locally persisted
//! state and an authenticated, server-backed state, including the one-time
//! merge of local items into the server cart on login.
//!
//! # Architecture
//!
//! - The presence of a session credential is the sole discriminator of which
//!   cart is authoritative; the [`session::SessionHandle`] is injected into
//!   every collaborator, never read from ambient state.
//! - Anonymous mutations are synchronous against a durable local slot and
//!   always succeed.
//! - Authenticated mutations go through the REST gateway and invalidate a
//!   short-lived read-through cache on success; nothing is written
//!   optimistically.
//! - Authenticated read-then-write cycles are serialized per cart, so rapid
//!   same-product mutations compound instead of overwriting each other.
//!
//! # Example
//!
//! ```rust,ignore
//! use kuppam_cart::{CartConfig, CartService};
//!
//! let config = CartConfig::from_env()?;
//! let cart = CartService::from_config(&config)?;
//! let _watcher = cart.spawn_session_watcher();
//!
//! cart.add(product, 1).await?;
//! let totals = cart.totals().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod local;
pub mod session;
pub mod storage;

pub use api::{ApiError, AuthApi, AuthService, CartApi};
pub use cache::CachePolicy;
pub use config::{CartConfig, ConfigError};
pub use engine::CartService;
pub use error::{CartError, Result};
pub use events::CartEvent;
pub use local::LocalCartStore;
pub use session::SessionHandle;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
