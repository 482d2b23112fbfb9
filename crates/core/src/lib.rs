//! Fakeshion Core - Shared domain types.
//!
//! This crate provides the types used across all Fakeshion components:
//! - `server` - JSON API, cache layer, order lifecycle and payment reconciliation
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database access,
//! no HTTP clients. The order status transition rule and the review rating math
//! live here so every store implementation applies them the same way.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, statuses, orders, products, reviews and payment records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
