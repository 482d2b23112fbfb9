//! Fakeshion API server library.
//!
//! Order lifecycle, catalog, reviews, payment reconciliation and sales
//! reporting behind a JSON API. Exposed as a library so the integration
//! tests can drive the router against the in-memory store.
//!
//! # Layers
//!
//! - [`routes`] - axum handlers, generic over the [`db::Store`]
//! - [`services`] - business operations; reads through the cache, writes
//!   to the store then invalidate
//! - [`cache`] - process-local TTL cache and the read-through layer
//! - [`db`] - repositories (`PostgreSQL` and in-memory)
//! - [`gateway`] - ZaloPay request signing and callback verification

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::router;
pub use state::AppState;
