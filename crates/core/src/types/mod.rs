//! Core types for Kuppam Organics.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod totals;

pub use cart::{CartLine, ProductSnapshot};
pub use id::*;
pub use totals::{CartTotals, total_items, total_price};
