//! Cache backend trait and statistics.
//!
//! Backends store opaque serialized strings under plain keys with a TTL.
//! Typing and (de)serialization live in [`super::ReadThroughCache`].

use std::time::Duration;

use async_trait::async_trait;

/// Error type for cache backend operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    /// The cache store could not be reached (connect failure, timeout).
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// The cache store answered with an error.
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Cache backend trait for pluggable cache implementations.
///
/// Implementations must be safe under concurrent use from many request tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the value stored under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (including backend failures treated as misses).
    pub misses: u64,
    /// Number of backend errors swallowed by fail-open handling.
    pub errors: u64,
    /// Number of explicit invalidations.
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
