//! Kuppam Core - Shared types library.
//!
//! This crate provides the domain types shared across the Kuppam Organics
//! storefront components:
//! - `cart` - Cart reconciliation library (local/remote carts, merge-on-login)
//! - `integration-tests` - End-to-end test harness
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, product snapshots, cart lines, and derived totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
