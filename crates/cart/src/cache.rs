//! Staleness policy for cached remote reads.
//!
//! The remote cart is mirrored client-side through a short-lived
//! read-through cache: reads within the freshness window are served locally,
//! successful mutations invalidate the entry so the next read refetches.
//! Mutations never write the cache.

use std::time::Duration;

use kuppam_core::CartLine;
use moka::future::Cache;

/// Cache key for the remote cart view.
pub(crate) const CART_CACHE_KEY: &str = "cart";

/// The cart view stays fresh for one minute.
const CART_STALE_SECS: u64 = 60;

/// A handful of resource views at most.
const MAX_ENTRIES: u64 = 16;

/// Freshness policy for the cached remote cart view.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    /// How long an entry is served without refetching.
    pub time_to_live: Duration,
    /// Upper bound on cached entries.
    pub max_capacity: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            time_to_live: Duration::from_secs(CART_STALE_SECS),
            max_capacity: MAX_ENTRIES,
        }
    }
}

impl CachePolicy {
    /// Default policy with a custom freshness window.
    #[must_use]
    pub fn with_time_to_live(time_to_live: Duration) -> Self {
        Self {
            time_to_live,
            ..Self::default()
        }
    }

    pub(crate) fn build(self) -> Cache<String, Vec<CartLine>> {
        Cache::builder()
            .max_capacity(self.max_capacity)
            .time_to_live(self.time_to_live)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_cart_staleness() {
        let policy = CachePolicy::default();
        assert_eq!(policy.time_to_live, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_built_cache_stores_and_invalidates() {
        let cache = CachePolicy::default().build();
        cache.insert(CART_CACHE_KEY.to_string(), Vec::new()).await;
        assert!(cache.get(CART_CACHE_KEY).await.is_some());

        cache.invalidate(CART_CACHE_KEY).await;
        assert!(cache.get(CART_CACHE_KEY).await.is_none());
    }
}
