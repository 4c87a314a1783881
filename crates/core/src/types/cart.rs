//! Cart line and product snapshot types.
//!
//! A cart (local or remote) is an ordered sequence of [`CartLine`]s. Each
//! line carries a denormalized [`ProductSnapshot`] so the cart can render
//! without re-fetching the catalog, plus a quantity.
//!
//! Invariants:
//! - a cart holds at most one line per distinct [`ProductId`](super::ProductId)
//! - `quantity >= 1`; removal is the only representation of "zero"

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProductId;

/// Denormalized product display data carried by a cart line.
///
/// This is a snapshot taken at add-to-cart time, not a live view of the
/// catalog. Prices in totals always use the snapshot price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    /// Backend-assigned product identifier, stable across sessions.
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Effective unit price (discounted price when one applies).
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Pre-discount price, when the product is on sale.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_price: Option<Decimal>,
    pub image: String,
    pub category: String,
    pub weight: String,
    pub in_stock: bool,
}

/// One product-quantity pairing within a cart.
///
/// Serializes flat (product fields alongside `quantity`), matching the
/// persisted local representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub product: ProductSnapshot,
    pub quantity: u32,
}

impl CartLine {
    /// Create a line for a product with the given quantity.
    #[must_use]
    pub const fn new(product: ProductSnapshot, quantity: u32) -> Self {
        Self { product, quantity }
    }

    /// The product identifier this line is keyed by.
    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.product.id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
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

    #[test]
    fn test_cart_line_serializes_flat() {
        let line = CartLine::new(snapshot("p1"), 2);
        let value = serde_json::to_value(&line).unwrap();

        // Product fields and quantity live at the same level
        assert_eq!(value["id"], "p1");
        assert_eq!(value["quantity"], 2);
        assert_eq!(value["inStock"], true);
        assert!(value.get("product").is_none());
        assert!(value.get("originalPrice").is_none());
    }

    #[test]
    fn test_cart_line_round_trip() {
        let mut product = snapshot("p2");
        product.original_price = Some(dec!(60.00));
        let line = CartLine::new(product, 3);

        let json = serde_json::to_string(&line).unwrap();
        let back: CartLine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, line);
    }

    #[test]
    fn test_cart_line_deserializes_numeric_price() {
        let json = r#"{
            "id": "p3",
            "name": "Palm Jaggery",
            "description": "",
            "price": 120.5,
            "image": "/images/jaggery.jpg",
            "category": "sweeteners",
            "weight": "500 g",
            "inStock": true,
            "quantity": 1
        }"#;

        let line: CartLine = serde_json::from_str(json).unwrap();
        assert_eq!(line.product.price, dec!(120.5));
        assert_eq!(line.quantity, 1);
    }
}
