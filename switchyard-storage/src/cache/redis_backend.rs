//! Redis-backed cache.
//!
//! Values are stored with `SET key value EX ttl`. One multiplexed connection is
//! shared by all callers; it is dropped after any failure and re-established
//! lazily on the next call, so a Redis outage costs each request at most one
//! bounded timeout.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use super::traits::{CacheBackend, CacheError};

pub struct RedisCacheBackend {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    op_timeout: Duration,
}

impl RedisCacheBackend {
    /// Create a backend for `redis_url`. Does not connect until first use.
    pub fn new(redis_url: &str, op_timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Unavailable(format!("invalid redis url: {}", e)))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            op_timeout,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(
            self.op_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Unavailable("connect timed out".to_string()))?
        .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        tracing::debug!("Connected to cache store");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        *self.conn.lock().await = None;
    }

    /// Run one command with the shared timeout, dropping the connection on failure.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T, CacheError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection().await?;
        let result = match tokio::time::timeout(self.op_timeout, op(conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_io_error() || e.is_connection_dropped() => {
                Err(CacheError::Unavailable(e.to_string()))
            }
            Ok(Err(e)) => Err(CacheError::Backend(e.to_string())),
            Err(_) => Err(CacheError::Unavailable("command timed out".to_string())),
        };
        if matches!(result, Err(CacheError::Unavailable(_))) {
            self.reset().await;
        }
        result
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = key.to_string();
        self.run(|mut conn| async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let key = key.to_string();
        // Redis rejects EX 0.
        let seconds = ttl.as_secs().max(1);
        self.run(|mut conn| async move { conn.set_ex::<_, _, ()>(key, value, seconds).await })
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let key = key.to_string();
        self.run(|mut conn| async move { conn.del::<_, ()>(key).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(RedisCacheBackend::new("not a url", Duration::from_millis(100)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_store_reports_unavailable() {
        // Port 1 on localhost refuses connections.
        let backend = match RedisCacheBackend::new("redis://127.0.0.1:1/", Duration::from_millis(200)) {
            Ok(backend) => backend,
            Err(e) => panic!("client construction should succeed: {}", e),
        };
        let result = backend.get("trains").await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }
}
