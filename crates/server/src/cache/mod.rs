//! Caching for order and product reads.
//!
//! - [`CacheStore`] - best-effort key/value store with per-key TTL (`moka`)
//! - [`ReadThrough`] - populate on miss, drop dependent keys on write
//! - [`CacheKey`] / [`Invalidation`] - the key scheme and write dependency sets
//!
//! The persistent store is the source of truth. Cached values are disposable
//! JSON projections and may vanish at any time.

mod keys;
mod read_through;
mod store;

pub use keys::{CacheKey, DEFAULT_TTL, Invalidation, PRODUCT_LIST_PREFIX, TOP_RATED_TTL};
pub use read_through::ReadThrough;
pub use store::CacheStore;
