//! Cart reconciliation engine.
//!
//! Exposes one cart API to the UI regardless of authentication state and
//! routes every operation to the store that is currently authoritative: the
//! durable local cart while anonymous, the server cart once a session
//! credential is present. Both states support every operation; only the
//! destination differs.
//!
//! Remote reads go through a short-lived cache; successful remote mutations
//! invalidate it instead of writing it, so the next read reflects the
//! server's answer. Remote read-then-write cycles are serialized through a
//! per-cart lock so rapid same-product mutations compound rather than
//! overwrite each other.

use std::sync::Arc;

use moka::future::Cache;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use kuppam_core::{CartLine, CartTotals, ProductId, ProductSnapshot};

use crate::api::{ApiError, CartApi};
use crate::cache::{CART_CACHE_KEY, CachePolicy};
use crate::config::CartConfig;
use crate::error::Result;
use crate::events::{self, CartEvent};
use crate::local::LocalCartStore;
use crate::session::SessionHandle;
use crate::storage::{FileStore, KeyValueStore};

/// The cart reconciliation engine.
///
/// Cheaply cloneable via `Arc`; clones share cache, lock, and event channel.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<CartServiceInner>,
}

struct CartServiceInner {
    api: CartApi,
    local: LocalCartStore,
    session: SessionHandle,
    cache: Cache<String, Vec<CartLine>>,
    // single-flight lock for remote read-then-write cycles
    mutations: Mutex<()>,
    events: broadcast::Sender<CartEvent>,
}

impl CartService {
    /// Assemble an engine from its collaborators.
    #[must_use]
    pub fn new(
        api: CartApi,
        local: LocalCartStore,
        session: SessionHandle,
        policy: CachePolicy,
    ) -> Self {
        Self {
            inner: Arc::new(CartServiceInner {
                api,
                local,
                session,
                cache: policy.build(),
                mutations: Mutex::new(()),
                events: events::channel(),
            }),
        }
    }

    /// Build an engine and its collaborators from configuration.
    ///
    /// Restores the session from the persisted token slot, so a process
    /// restart resumes in the state it left.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &CartConfig) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.storage_dir));
        let session = SessionHandle::restore(Arc::clone(&store));
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(ApiError::from)?;
        let api = CartApi::new(client, config.api_base_url.as_str(), session.clone());
        let local = LocalCartStore::new(store);

        Ok(Self::new(
            api,
            local,
            session,
            CachePolicy::with_time_to_live(config.cart_stale),
        ))
    }

    /// The session signal this engine branches on.
    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.inner.session
    }

    /// Subscribe to cart change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Cart operations
    // =========================================================================

    /// The active line list: the server cart once authenticated, the local
    /// cart otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails while authenticated. The
    /// anonymous path cannot fail.
    #[instrument(skip(self))]
    pub async fn lines(&self) -> Result<Vec<CartLine>> {
        if self.inner.session.is_authenticated() {
            Ok(self.remote_lines().await?)
        } else {
            Ok(self.inner.local.lines())
        }
    }

    /// Item count and monetary total over the active line list.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails while authenticated.
    pub async fn totals(&self) -> Result<CartTotals> {
        Ok(CartTotals::of(&self.lines().await?))
    }

    /// Add a product. Repeated adds of the same product increment its line's
    /// quantity; a quantity of zero is a no-op.
    ///
    /// The anonymous path always succeeds. The authenticated path issues an
    /// update (existing + quantity) or a create; on failure nothing was
    /// mutated and the cached view is left as it was.
    ///
    /// # Errors
    ///
    /// Returns an error if a remote call fails while authenticated.
    #[instrument(skip(self, product), fields(product_id = %product.id, quantity))]
    pub async fn add(&self, product: ProductSnapshot, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Ok(());
        }

        if !self.inner.session.is_authenticated() {
            self.inner.local.add(product, quantity);
            self.emit(CartEvent::Updated);
            return Ok(());
        }

        let _guard = self.inner.mutations.lock().await;
        let lines = self.remote_lines().await?;
        let result = match lines.iter().find(|line| line.product_id() == &product.id) {
            Some(existing) => {
                let quantity = i64::from(existing.quantity) + i64::from(quantity);
                self.inner.api.update_line(&product.id, quantity).await
            }
            None => {
                self.inner
                    .api
                    .create_line(&product.id, i64::from(quantity))
                    .await
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to add item to cart");
            return Err(e.into());
        }
        self.invalidate_remote().await;
        self.emit(CartEvent::Updated);
        Ok(())
    }

    /// Add one unit of a product.
    ///
    /// # Errors
    ///
    /// Returns an error if a remote call fails while authenticated.
    pub async fn add_one(&self, product: ProductSnapshot) -> Result<()> {
        self.add(product, 1).await
    }

    /// Remove a line.
    ///
    /// The remote delete is issued regardless of what the cached view knows;
    /// on failure a [`CartEvent::RemoveFailed`] notification fires and cart
    /// state is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote delete fails while authenticated.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<()> {
        if !self.inner.session.is_authenticated() {
            self.inner.local.remove(product_id);
            self.emit(CartEvent::ItemRemoved);
            return Ok(());
        }

        let _guard = self.inner.mutations.lock().await;
        match self.inner.api.delete_line(product_id).await {
            Ok(_) => {
                self.invalidate_remote().await;
                self.emit(CartEvent::ItemRemoved);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to remove item from cart");
                self.emit(CartEvent::RemoveFailed);
                Err(e.into())
            }
        }
    }

    /// Set a line's quantity. Zero or negative delegates to [`Self::remove`],
    /// so no zero-quantity line can exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a remote call fails while authenticated.
    #[instrument(skip(self), fields(product_id = %product_id, quantity))]
    pub async fn set_quantity(&self, product_id: &ProductId, quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return self.remove(product_id).await;
        }

        if !self.inner.session.is_authenticated() {
            let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
            self.inner.local.set_quantity(product_id, quantity);
            self.emit(CartEvent::Updated);
            return Ok(());
        }

        let _guard = self.inner.mutations.lock().await;
        if let Err(e) = self.inner.api.update_line(product_id, quantity).await {
            warn!(error = %e, "failed to update cart quantity");
            return Err(e.into());
        }
        self.invalidate_remote().await;
        self.emit(CartEvent::Updated);
        Ok(())
    }

    /// Empty the active cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote delete-all fails while authenticated.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if !self.inner.session.is_authenticated() {
            self.inner.local.clear();
            self.emit(CartEvent::Updated);
            return Ok(());
        }

        let _guard = self.inner.mutations.lock().await;
        if let Err(e) = self.inner.api.delete_all().await {
            warn!(error = %e, "failed to clear cart");
            return Err(e.into());
        }
        self.invalidate_remote().await;
        self.emit(CartEvent::Updated);
        Ok(())
    }

    // =========================================================================
    // Merge-on-login
    // =========================================================================

    /// Merge locally held lines into the server cart.
    ///
    /// Runs on the anonymous-to-authenticated transition (see
    /// [`Self::spawn_session_watcher`]). Best-effort, not transactional: the
    /// server cart is re-read fresh (bypassing the cache), then each local
    /// line is pushed sequentially and dropped from the local cart as it
    /// lands. A failure partway aborts with the un-merged remainder intact,
    /// so the next login pushes exactly the lines that are still missing -
    /// nothing merges twice, and server quantities never decrease.
    ///
    /// Returns the number of lines merged.
    ///
    /// # Errors
    ///
    /// Returns an error if the fresh fetch or any per-line call fails. Login
    /// flows treat this as advisory; the session watcher only logs it.
    #[instrument(skip(self))]
    pub async fn merge_on_login(&self) -> Result<usize> {
        let local_lines = self.inner.local.lines();
        if local_lines.is_empty() {
            debug!("local cart empty, nothing to merge");
            return Ok(0);
        }

        let _guard = self.inner.mutations.lock().await;
        match self.push_lines(&local_lines).await {
            Ok(merged) => {
                self.inner.local.clear();
                self.invalidate_remote().await;
                self.emit(CartEvent::MergeCompleted);
                info!(merged, "merged local cart into server cart");
                Ok(merged)
            }
            Err(e) => {
                warn!(error = %e, "cart merge aborted, local cart preserved");
                self.emit(CartEvent::MergeFailed);
                Err(e.into())
            }
        }
    }

    /// Push local lines onto the server cart, in stored order.
    async fn push_lines(&self, local_lines: &[CartLine]) -> std::result::Result<usize, ApiError> {
        // Fresh read: merging against a stale cached view could double-count
        let remote_lines = self.inner.api.get_cart().await?;

        for line in local_lines {
            match remote_lines
                .iter()
                .find(|remote| remote.product_id() == line.product_id())
            {
                Some(remote) => {
                    let quantity = i64::from(remote.quantity) + i64::from(line.quantity);
                    self.inner.api.update_line(line.product_id(), quantity).await?;
                }
                None => {
                    self.inner
                        .api
                        .create_line(line.product_id(), i64::from(line.quantity))
                        .await?;
                }
            }
            // Per-line commit: a retry only pushes what has not landed yet
            self.inner.local.remove(line.product_id());
        }
        Ok(local_lines.len())
    }

    /// Attach the engine to its session signal.
    ///
    /// Spawns a task that reacts to session transitions: merge-on-login when
    /// a credential appears, dropping the cached remote view when it goes
    /// away. Merge failure is logged, never surfaced to the login flow.
    pub fn spawn_session_watcher(&self) -> JoinHandle<()> {
        let service = self.clone();
        let mut rx = self.inner.session.subscribe();
        tokio::spawn(async move {
            let mut was_authenticated = rx.borrow_and_update().is_some();
            while rx.changed().await.is_ok() {
                let is_authenticated = rx.borrow_and_update().is_some();
                match (was_authenticated, is_authenticated) {
                    (false, true) => {
                        if let Err(e) = service.merge_on_login().await {
                            warn!(error = %e, "merge-on-login failed");
                        }
                    }
                    (true, false) => {
                        service.invalidate_remote().await;
                        service.emit(CartEvent::Updated);
                    }
                    _ => {}
                }
                was_authenticated = is_authenticated;
            }
        })
    }

    // =========================================================================
    // Remote view
    // =========================================================================

    /// Read-through view of the server cart.
    async fn remote_lines(&self) -> std::result::Result<Vec<CartLine>, ApiError> {
        if let Some(lines) = self.inner.cache.get(CART_CACHE_KEY).await {
            debug!("cache hit for cart");
            return Ok(lines);
        }

        let lines = self.inner.api.get_cart().await?;
        self.inner
            .cache
            .insert(CART_CACHE_KEY.to_string(), lines.clone())
            .await;
        Ok(lines)
    }

    async fn invalidate_remote(&self) {
        self.inner.cache.invalidate(CART_CACHE_KEY).await;
    }

    fn emit(&self, event: CartEvent) {
        // nobody listening is fine
        let _ = self.inner.events.send(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use kuppam_core::total_items;
    use rust_decimal::dec;

    fn snapshot(id: &str) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: dec!(45.00),
            original_price: None,
            image: "/placeholder.svg".to_string(),
            category: "grains".to_string(),
            weight: "1 kg".to_string(),
            in_stock: true,
        }
    }

    /// Engine wired to in-memory storage and an unreachable backend; the
    /// anonymous paths must never touch the network.
    fn anonymous_service() -> CartService {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = SessionHandle::restore(Arc::clone(&store));
        let api = CartApi::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            session.clone(),
        );
        CartService::new(
            api,
            LocalCartStore::new(store),
            session,
            CachePolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_repeated_add_increments_single_line() {
        let cart = anonymous_service();
        cart.add(snapshot("p1"), 1).await.unwrap();
        cart.add(snapshot("p1"), 1).await.unwrap();

        let lines = cart.lines().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_add_zero_is_noop() {
        let cart = anonymous_service();
        cart.add(snapshot("p1"), 0).await.unwrap();
        assert_eq!(cart.totals().await.unwrap().items, 0);
    }

    #[tokio::test]
    async fn test_add_one_defaults_quantity() {
        let cart = anonymous_service();
        cart.add_one(snapshot("p1")).await.unwrap();
        assert_eq!(cart.totals().await.unwrap().items, 1);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_and_negative_remove() {
        let cart = anonymous_service();
        cart.add(snapshot("p1"), 2).await.unwrap();
        cart.set_quantity(&ProductId::new("p1"), 0).await.unwrap();
        assert!(cart.lines().await.unwrap().is_empty());

        cart.add(snapshot("p1"), 2).await.unwrap();
        cart.set_quantity(&ProductId::new("p1"), -5).await.unwrap();
        assert!(cart.lines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_totals_track_local_mutations() {
        let cart = anonymous_service();
        cart.add(snapshot("p1"), 2).await.unwrap();
        cart.add(snapshot("p2"), 3).await.unwrap();

        let totals = cart.totals().await.unwrap();
        assert_eq!(totals.items, 5);
        assert_eq!(totals.price, dec!(225.00));
        assert_eq!(totals.items, total_items(&cart.lines().await.unwrap()));
    }

    #[tokio::test]
    async fn test_clear_empties_local_cart() {
        let cart = anonymous_service();
        cart.add(snapshot("p1"), 2).await.unwrap();
        cart.clear().await.unwrap();
        assert!(cart.lines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_emit_events() {
        let cart = anonymous_service();
        let mut rx = cart.subscribe();

        cart.add(snapshot("p1"), 1).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), CartEvent::Updated);

        cart.remove(&ProductId::new("p1")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), CartEvent::ItemRemoved);
    }

    #[tokio::test]
    async fn test_merge_with_empty_local_cart_is_noop() {
        // No network involved: the empty check runs before any fetch
        let cart = anonymous_service();
        assert_eq!(cart.merge_on_login().await.unwrap(), 0);
    }
}
