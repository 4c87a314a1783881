//! Derived cart totals.
//!
//! Pure functions over whichever line list is currently active (local or
//! remote). Recomputed from scratch on every call; no memoization.

use rust_decimal::Decimal;

use super::CartLine;

/// Item count and monetary total for a line list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    /// Sum of quantities over all lines.
    pub items: u64,
    /// Sum of `price * quantity` using each line's snapshot price.
    pub price: Decimal,
}

impl CartTotals {
    /// Compute totals for a line list.
    #[must_use]
    pub fn of(lines: &[CartLine]) -> Self {
        Self {
            items: total_items(lines),
            price: total_price(lines),
        }
    }
}

/// Sum of quantities over all lines.
#[must_use]
pub fn total_items(lines: &[CartLine]) -> u64 {
    lines.iter().map(|line| u64::from(line.quantity)).sum()
}

/// Sum of `price * quantity` over all lines, using the snapshot unit price.
#[must_use]
pub fn total_price(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.product.price * Decimal::from(line.quantity))
        .sum()
}
