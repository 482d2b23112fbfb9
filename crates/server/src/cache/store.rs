//! Best-effort key/value store with per-key expiry.
//!
//! Backed by `moka`. Every operation is soft: when the store is disabled or
//! has been closed, reads are misses and writes are dropped. Callers always
//! fall back to the persistent store, so the system stays correct with
//! caching turned off.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use tracing::{debug, warn};

use crate::config::CacheConfig;

/// A cached, serialized value and the TTL it was written with.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<str>,
    ttl: Duration,
}

/// Expire each entry after the TTL given at write time.
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Handle to the cache. Cheap to clone; all clones share one store.
#[derive(Clone)]
pub struct CacheStore {
    inner: Option<Arc<CacheStoreInner>>,
}

struct CacheStoreInner {
    cache: Cache<String, CacheEntry>,
    closed: AtomicBool,
}

impl CacheStore {
    /// Open the cache described by `config`.
    ///
    /// A disabled config yields a store where every call is a no-op.
    #[must_use]
    pub fn open(config: &CacheConfig) -> Self {
        if !config.enabled {
            tracing::info!("Cache disabled; all reads go to the store");
            return Self::disabled();
        }

        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .expire_after(EntryTtl)
            .build();

        Self {
            inner: Some(Arc::new(CacheStoreInner {
                cache,
                closed: AtomicBool::new(false),
            })),
        }
    }

    /// A store that never holds anything.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { inner: None }
    }

    /// The live cache, or `None` when caching is unavailable.
    fn live(&self) -> Option<&Cache<String, CacheEntry>> {
        let inner = self.inner.as_ref()?;
        if inner.closed.load(Ordering::Acquire) {
            debug!("Cache unavailable (closed); bypassing");
            return None;
        }
        Some(&inner.cache)
    }

    /// Fetch a serialized value. Absence is a normal miss.
    pub async fn get(&self, key: &str) -> Option<Arc<str>> {
        let cache = self.live()?;
        cache.get(key).await.map(|entry| entry.value)
    }

    /// Store a serialized value for `ttl`.
    pub async fn set(&self, key: String, value: String, ttl: Duration) {
        let Some(cache) = self.live() else {
            return;
        };
        if ttl.is_zero() {
            warn!(key = %key, "Refusing to cache entry with zero TTL");
            return;
        }
        cache
            .insert(
                key,
                CacheEntry {
                    value: Arc::from(value),
                    ttl,
                },
            )
            .await;
    }

    /// Drop a single key.
    pub async fn delete(&self, key: &str) {
        if let Some(cache) = self.live() {
            cache.invalidate(key).await;
        }
    }

    /// Drop every key starting with `prefix`. Returns how many were removed.
    pub async fn delete_by_prefix(&self, prefix: &str) -> usize {
        let Some(cache) = self.live() else {
            return 0;
        };
        let matching: Vec<Arc<String>> = cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();
        for key in &matching {
            cache.invalidate(key.as_str()).await;
        }
        matching.len()
    }

    /// Number of live entries, after flushing pending maintenance.
    pub async fn entry_count(&self) -> u64 {
        let Some(cache) = self.live() else {
            return 0;
        };
        cache.run_pending_tasks().await;
        cache.entry_count()
    }

    /// Drop all entries and stop serving. Called once at shutdown.
    pub async fn close(&self) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        if inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        inner.cache.invalidate_all();
        inner.cache.run_pending_tasks().await;
        tracing::info!("Cache closed");
    }
}
