//! Read-through caching and write-invalidation over the persistent store.
//!
//! Reads check the cache first and fall back to a loader on a miss, storing
//! what the loader returned. Writes call [`ReadThrough::invalidate`] after
//! committing to the store.
//!
//! A load racing with an invalidation must not leave the pre-write value
//! cached. Every invalidation bumps an epoch before deleting keys; a loader
//! that observes a changed epoch does not store its result, and one that
//! sees the epoch move during the write removes it again.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::keys::{CacheKey, Invalidation};
use super::store::CacheStore;

/// Read-through / write-invalidate layer shared by the services.
#[derive(Clone)]
pub struct ReadThrough {
    cache: CacheStore,
    epoch: Arc<AtomicU64>,
}

impl ReadThrough {
    #[must_use]
    pub fn new(cache: CacheStore) -> Self {
        Self {
            cache,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return the cached value for `key`, or load, cache and return it.
    ///
    /// A loader returning `Ok(None)` is not cached: absent entities are
    /// looked up again on the next read.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error. Cache failures never surface.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &CacheKey, loader: F) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let raw_key = key.to_string();
        if let Some(hit) = self.lookup(&raw_key).await {
            return Ok(Some(hit));
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let loaded = loader().await?;
        if let Some(value) = &loaded {
            self.fill(key, raw_key, value, epoch).await;
        }
        Ok(loaded)
    }

    /// Like [`get_or_load`](Self::get_or_load) for loaders that always
    /// produce a value, such as list queries.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error.
    pub async fn get_or_load_value<T, E, F, Fut>(&self, key: &CacheKey, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let raw_key = key.to_string();
        if let Some(hit) = self.lookup(&raw_key).await {
            return Ok(hit);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let loaded = loader().await?;
        self.fill(key, raw_key, &loaded, epoch).await;
        Ok(loaded)
    }

    /// Drop every entry a write made stale.
    ///
    /// After this returns, the next read of any listed key (or any key under
    /// a listed prefix) reloads from the store.
    pub async fn invalidate(&self, invalidation: &Invalidation) {
        if invalidation.is_empty() {
            return;
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);

        for key in &invalidation.keys {
            self.cache.delete(&key.to_string()).await;
        }
        for prefix in &invalidation.prefixes {
            let removed = self.cache.delete_by_prefix(prefix).await;
            debug!(prefix = %prefix, removed, "Invalidated cache prefix");
        }
        debug!(
            keys = invalidation.keys.len(),
            prefixes = invalidation.prefixes.len(),
            "Cache invalidated"
        );
    }

    async fn lookup<T: DeserializeOwned>(&self, raw_key: &str) -> Option<T> {
        let raw = self.cache.get(raw_key).await?;
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                debug!(key = %raw_key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %raw_key, error = %e, "Discarding undecodable cache entry");
                self.cache.delete(raw_key).await;
                None
            }
        }
    }

    async fn fill<T: Serialize>(&self, key: &CacheKey, raw_key: String, value: &T, epoch: u64) {
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                warn!(key = %raw_key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };

        // An invalidation ran while we were loading; the value may predate it.
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(key = %raw_key, "Skipping fill superseded by an invalidation");
            return;
        }

        debug!(key = %raw_key, "Cache miss; storing loaded value");
        self.cache.set(raw_key.clone(), serialized, key.ttl()).await;

        // Same check for an invalidation that landed between the check and the set.
        if self.epoch.load(Ordering::SeqCst) != epoch {
            self.cache.delete(&raw_key).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use fakeshion_core::{OrderId, ProductId};

    use super::*;
    use crate::cache::PRODUCT_LIST_PREFIX;
    use crate::config::CacheConfig;

    fn layer() -> ReadThrough {
        ReadThrough::new(CacheStore::open(&CacheConfig::default()))
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let rt = layer();
        let calls = AtomicUsize::new(0);
        let key = CacheKey::OrderDetail(OrderId::new(1));

        for _ in 0..3 {
            let value: Option<String> = rt
                .get_or_load(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(Some("order".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(value.as_deref(), Some("order"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_absent_entities_are_not_cached() {
        let rt = layer();
        let calls = AtomicUsize::new(0);
        let key = CacheKey::ProductDetail(ProductId::new(404));

        for _ in 0..2 {
            let value: Option<String> = rt
                .get_or_load(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(None)
                })
                .await
                .unwrap();
            assert!(value.is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_after_invalidate_sees_new_value() {
        let rt = layer();
        let key = CacheKey::AllOrders;

        let before: Vec<i32> = rt
            .get_or_load_value(&key, || async { Ok::<_, ()>(vec![1]) })
            .await
            .unwrap();
        assert_eq!(before, vec![1]);

        rt.invalidate(&Invalidation::new().key(CacheKey::AllOrders)).await;

        let after: Vec<i32> = rt
            .get_or_load_value(&key, || async { Ok::<_, ()>(vec![1, 2]) })
            .await
            .unwrap();
        assert_eq!(after, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_prefix_invalidation_drops_all_filtered_lists() {
        let rt = layer();
        let a = CacheKey::ProductList("a".to_string());
        let b = CacheKey::ProductList("b".to_string());
        for key in [&a, &b] {
            let _: u8 = rt.get_or_load_value(key, || async { Ok::<_, ()>(1) }).await.unwrap();
        }

        rt.invalidate(&Invalidation::new().prefix(PRODUCT_LIST_PREFIX)).await;

        for key in [&a, &b] {
            let v: u8 = rt.get_or_load_value(key, || async { Ok::<_, ()>(2) }).await.unwrap();
            assert_eq!(v, 2);
        }
    }

    #[tokio::test]
    async fn test_load_racing_an_invalidation_is_not_kept() {
        let rt = layer();
        let key = CacheKey::OrderDetail(OrderId::new(7));

        let stale: Option<String> = rt
            .get_or_load(&key, || {
                let rt = rt.clone();
                async move {
                    // The write lands and invalidates while this load is in flight.
                    rt.invalidate(&Invalidation::new().key(CacheKey::OrderDetail(OrderId::new(7))))
                        .await;
                    Ok::<_, ()>(Some("old".to_string()))
                }
            })
            .await
            .unwrap();
        assert_eq!(stale.as_deref(), Some("old"));
        assert!(rt.cache.get(&key.to_string()).await.is_none());

        let fresh: Option<String> = rt
            .get_or_load(&key, || async { Ok::<_, ()>(Some("new".to_string())) })
            .await
            .unwrap();
        assert_eq!(fresh.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_fill_from_a_superseded_epoch_never_writes() {
        let rt = layer();
        let key = CacheKey::TopRated;
        let started = rt.epoch.load(Ordering::SeqCst);

        rt.invalidate(&Invalidation::new().key(CacheKey::TopRated)).await;
        rt.fill(&key, key.to_string(), &vec![1_u8], started).await;
        assert!(rt.cache.get(&key.to_string()).await.is_none());

        let current = rt.epoch.load(Ordering::SeqCst);
        rt.fill(&key, key.to_string(), &vec![2_u8], current).await;
        assert_eq!(rt.cache.get(&key.to_string()).await.as_deref(), Some("[2]"));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_treated_as_miss() {
        let rt = layer();
        let key = CacheKey::TopRated;
        rt.cache
            .set(key.to_string(), "not json".to_string(), key.ttl())
            .await;

        let value: Vec<i32> = rt
            .get_or_load_value(&key, || async { Ok::<_, ()>(vec![3]) })
            .await
            .unwrap();
        assert_eq!(value, vec![3]);
    }

    #[tokio::test]
    async fn test_loader_errors_propagate_and_nothing_is_cached() {
        let rt = layer();
        let key = CacheKey::AllOrders;
        let result: Result<Vec<i32>, &str> =
            rt.get_or_load_value(&key, || async { Err("store down") }).await;
        assert_eq!(result, Err("store down"));
        assert!(rt.cache.get(&key.to_string()).await.is_none());
    }
}
