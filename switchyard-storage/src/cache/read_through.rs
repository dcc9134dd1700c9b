//! Read-through cache with fail-open semantics.
//!
//! Reads go to the backend first; a miss (or any backend failure) runs the
//! caller's loader and stores the result. The cache never turns a working
//! read into a failed one: backend errors are logged, counted and treated as
//! misses.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use super::traits::{CacheBackend, CacheStats};

/// Configuration for the read-through cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied to collection entries.
    pub entry_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    invalidations: AtomicU64,
}

/// Read-through cache over any [`CacheBackend`].
///
/// # Example
///
/// ```ignore
/// let trains: Vec<Train> = cache
///     .get_or_load(keys::TRAINS, ttl, || async { router.acquire_read().await?.list_trains().await })
///     .await?;
/// ```
#[derive(Clone)]
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    counters: Arc<Counters>,
}

impl ReadThroughCache {
    /// Create a new read-through cache.
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create a cache with default configuration.
    pub fn with_defaults(backend: Arc<dyn CacheBackend>) -> Self {
        Self::new(backend, CacheConfig::default())
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `key`, or run `loader`, cache its result for
    /// `ttl` and return it.
    ///
    /// Loader errors are returned unchanged and nothing is cached.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key, error = %e, "Undecodable cache entry, reloading");
                }
            },
            Ok(None) => {}
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key, error = %e, "Cache read failed, falling back to storage");
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key, "Cache miss");

        let value = loader().await?;
        self.store(key, &value, ttl).await;
        Ok(value)
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };
        if let Err(e) = self.backend.set(key, raw, ttl).await {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(key, error = %e, "Cache write failed");
        }
    }

    /// Remove `key` unconditionally. Failures are logged, never returned.
    pub async fn invalidate(&self, key: &str) {
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.backend.delete(key).await {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(key, error = %e, "Cache invalidation failed");
        } else {
            tracing::debug!(key, "Cache invalidated");
        }
    }

    /// Invalidate several keys in order.
    pub async fn invalidate_all(&self, keys: &[&str]) {
        for key in keys {
            self.invalidate(key).await;
        }
    }

    /// Snapshot of the hit/miss/error counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCacheBackend;
    use crate::cache::traits::CacheError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }
    }

    fn memory_cache() -> (ReadThroughCache, Arc<InMemoryCacheBackend>) {
        let backend = Arc::new(InMemoryCacheBackend::new());
        (ReadThroughCache::with_defaults(backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_miss_then_hit() -> Result<(), String> {
        let (cache, _) = memory_cache();
        let loads = AtomicUsize::new(0);
        let ttl = cache.config().entry_ttl;

        for _ in 0..3 {
            let value: Vec<i32> = cache
                .get_or_load("trains", ttl, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(vec![1, 2, 3])
                })
                .await?;
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_loader_error_is_not_cached() {
        let (cache, backend) = memory_cache();
        let result: Result<Vec<i32>, String> = cache
            .get_or_load("bookings", Duration::from_secs(60), || async {
                Err("replica down".to_string())
            })
            .await;
        assert_eq!(result, Err("replica down".to_string()));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() -> Result<(), String> {
        let (cache, _) = memory_cache();
        let ttl = Duration::from_secs(60);

        let first: Vec<String> = cache
            .get_or_load("lobbies", ttl, || async { Ok::<_, String>(vec!["old".to_string()]) })
            .await?;
        assert_eq!(first, vec!["old".to_string()]);

        cache.invalidate("lobbies").await;

        let second: Vec<String> = cache
            .get_or_load("lobbies", ttl, || async { Ok::<_, String>(vec!["new".to_string()]) })
            .await?;
        assert_eq!(second, vec!["new".to_string()]);
        assert_eq!(cache.stats().invalidations, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_backend_failure_fails_open() -> Result<(), String> {
        let cache = ReadThroughCache::with_defaults(Arc::new(FailingBackend));

        let value: u32 = cache
            .get_or_load("trains", Duration::from_secs(60), || async { Ok::<_, String>(7) })
            .await?;
        assert_eq!(value, 7);

        cache.invalidate("trains").await;

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        // get, set and delete each failed once
        assert_eq!(stats.errors, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_reloaded() -> Result<(), String> {
        let (cache, backend) = memory_cache();
        backend
            .set("trains", "{not json".to_string(), Duration::from_secs(60))
            .await
            .map_err(|e| e.to_string())?;

        let value: Vec<u8> = cache
            .get_or_load("trains", Duration::from_secs(60), || async { Ok::<_, String>(vec![9]) })
            .await?;
        assert_eq!(value, vec![9]);
        Ok(())
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new().with_ttl(Duration::from_secs(5));
        assert_eq!(config.entry_ttl, Duration::from_secs(5));
        assert_eq!(CacheConfig::default().entry_ttl, Duration::from_secs(60));
    }
}
