//! Wire-shape conversions for the cart REST surface.
//!
//! The backend returns cart line items wrapping full product payloads; the
//! engine works with flat display lines. Items without a product payload
//! are dropped rather than failing the whole cart.

use rust_decimal::Decimal;
use serde::Deserialize;

use kuppam_core::{CartLine, ProductId, ProductSnapshot};

const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";
const DEFAULT_CATEGORY: &str = "uncategorized";
const DEFAULT_WEIGHT: &str = "1 kg";

/// Response envelope shared by `GET /cart` and every cart mutation.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CartEnvelope {
    #[serde(default)]
    pub cart: Option<ApiCart>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiCart {
    #[serde(default)]
    pub items: Vec<ApiCartItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCartItem {
    #[serde(default)]
    pub product: Option<ApiProduct>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub discounted_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub category: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

/// Reconstruct display lines from an API cart envelope.
pub(crate) fn convert_cart_lines(envelope: CartEnvelope) -> Vec<CartLine> {
    envelope
        .cart
        .unwrap_or_default()
        .items
        .into_iter()
        .filter_map(convert_cart_item)
        .collect()
}

fn convert_cart_item(item: ApiCartItem) -> Option<CartLine> {
    let product = item.product?;
    let snapshot = ProductSnapshot {
        // The discounted price, when present, is the effective unit price
        price: product.discounted_price.unwrap_or(product.price),
        original_price: product.discounted_price.is_some().then_some(product.price),
        image: product
            .images
            .into_iter()
            .next()
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        category: product
            .category
            .map_or_else(|| DEFAULT_CATEGORY.to_string(), |c| c.to_lowercase()),
        weight: DEFAULT_WEIGHT.to_string(),
        in_stock: product.stock > 0,
        id: product.id,
        name: product.name,
        description: product.description,
    };
    Some(CartLine::new(snapshot, item.quantity))
}
