//! Local cart store: the anonymous, device-owned cart.
//!
//! An ordered list of cart lines persisted as a JSON array in a durable
//! local slot. Mutations are synchronous and strictly ordered: each call
//! fully completes, including persistence, before returning.
//!
//! Callers never see storage failures. A missing or corrupt slot reads as
//! an empty cart; a failed write is logged and dropped.

use std::sync::{Arc, Mutex, PoisonError};

use kuppam_core::{CartLine, ProductId, ProductSnapshot};
use tracing::warn;

use crate::storage::{CART_KEY, KeyValueStore};

/// Ordered cart line list backed by a durable local slot.
#[derive(Clone)]
pub struct LocalCartStore {
    store: Arc<dyn KeyValueStore>,
    // serializes load-modify-persist cycles within this process
    guard: Arc<Mutex<()>>,
}

impl LocalCartStore {
    /// Create a store over the given slot backend.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            guard: Arc::new(Mutex::new(())),
        }
    }

    /// Current lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.load()
    }

    /// Whether the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    /// Add a product: increment the existing line's quantity, or append a
    /// new line. A quantity of zero is a no-op.
    pub fn add(&self, product: ProductSnapshot, quantity: u32) {
        if quantity == 0 {
            return;
        }
        let _guard = self.lock();
        let mut lines = self.load();
        match lines.iter_mut().find(|line| line.product.id == product.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => lines.push(CartLine::new(product, quantity)),
        }
        self.persist(&lines);
    }

    /// Set an existing line's quantity in place. Unknown products are left
    /// alone; zero delegates to [`Self::remove`] so no zero-quantity line
    /// can exist.
    pub fn set_quantity(&self, product_id: &ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }
        let _guard = self.lock();
        let mut lines = self.load();
        if let Some(line) = lines.iter_mut().find(|line| line.product_id() == product_id) {
            line.quantity = quantity;
            self.persist(&lines);
        }
    }

    /// Remove a line. Removing an absent product changes nothing.
    pub fn remove(&self, product_id: &ProductId) {
        let _guard = self.lock();
        let mut lines = self.load();
        lines.retain(|line| line.product_id() != product_id);
        self.persist(&lines);
    }

    /// Wipe the cart and its persisted slot.
    pub fn clear(&self) {
        let _guard = self.lock();
        if let Err(e) = self.store.remove(CART_KEY) {
            warn!(error = %e, "failed to clear persisted cart");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Vec<CartLine> {
        self.store
            .get(CART_KEY)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(lines) => Some(lines),
                Err(e) => {
                    warn!(error = %e, "corrupt persisted cart, treating as empty");
                    None
                }
            })
            .unwrap_or_default()
    }

    fn persist(&self, lines: &[CartLine]) {
        match serde_json::to_string(lines) {
            Ok(serialized) => {
                if let Err(e) = self.store.set(CART_KEY, &serialized) {
                    warn!(error = %e, "failed to persist cart");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize cart"),
        }
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

    fn store() -> (Arc<MemoryStore>, LocalCartStore) {
        let backend = Arc::new(MemoryStore::new());
        let cart = LocalCartStore::new(backend.clone());
        (backend, cart)
    }

    #[test]
    fn test_add_deduplicates_by_product() {
        let (_, cart) = store();
        cart.add(snapshot("p1"), 1);
        cart.add(snapshot("p1"), 1);

        let lines = cart.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().unwrap().quantity, 2);
    }

    #[test]
    fn test_add_zero_is_noop() {
        let (_, cart) = store();
        cart.add(snapshot("p1"), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let (_, cart) = store();
        cart.add(snapshot("p1"), 1);
        cart.add(snapshot("p2"), 1);
        cart.add(snapshot("p1"), 3);

        let ids: Vec<_> = cart
            .lines()
            .iter()
            .map(|line| line.product_id().to_string())
            .collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_set_quantity_mutates_in_place() {
        let (_, cart) = store();
        cart.add(snapshot("p1"), 2);
        cart.set_quantity(&ProductId::new("p1"), 7);
        assert_eq!(cart.lines().first().unwrap().quantity, 7);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let (_, cart) = store();
        cart.add(snapshot("p1"), 2);
        cart.set_quantity(&ProductId::new("p1"), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_product_is_noop() {
        let (_, cart) = store();
        cart.add(snapshot("p1"), 2);
        cart.set_quantity(&ProductId::new("p9"), 4);

        let lines = cart.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().unwrap().quantity, 2);
    }

    #[test]
    fn test_remove_filters_line_out() {
        let (_, cart) = store();
        cart.add(snapshot("p1"), 1);
        cart.add(snapshot("p2"), 1);
        cart.remove(&ProductId::new("p1"));

        let lines = cart.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().unwrap().product_id(), &ProductId::new("p2"));
    }

    #[test]
    fn test_clear_removes_persisted_slot() {
        let (backend, cart) = store();
        cart.add(snapshot("p1"), 1);
        assert!(backend.get(CART_KEY).is_some());

        cart.clear();
        assert!(backend.get(CART_KEY).is_none());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_corrupt_slot_reads_as_empty() {
        let (backend, cart) = store();
        backend.set(CART_KEY, "{not json").unwrap();
        assert!(cart.lines().is_empty());
    }

    #[test]
    fn test_persisted_round_trip_preserves_order() {
        let (backend, cart) = store();
        cart.add(snapshot("p1"), 2);
        cart.add(snapshot("p2"), 1);
        cart.add(snapshot("p3"), 5);
        let before = cart.lines();

        // A fresh store over the same backend sees the identical list
        let reloaded = LocalCartStore::new(backend);
        assert_eq!(reloaded.lines(), before);
    }

    #[test]
    fn test_op_sequences_never_duplicate_and_totals_agree() {
        let (_, cart) = store();
        cart.add(snapshot("p1"), 1);
        cart.add(snapshot("p2"), 3);
        cart.add(snapshot("p1"), 2);
        cart.set_quantity(&ProductId::new("p2"), 1);
        cart.remove(&ProductId::new("p3"));
        cart.add(snapshot("p3"), 4);

        let lines = cart.lines();
        let ids: std::collections::HashSet<_> = lines.iter().map(CartLine::product_id).collect();
        assert_eq!(ids.len(), lines.len());

        let quantity_sum: u64 = lines.iter().map(|line| u64::from(line.quantity)).sum();
        assert_eq!(total_items(&lines), quantity_sum);
        assert_eq!(quantity_sum, 8);
    }
}
