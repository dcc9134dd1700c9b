//! Service registry: the externally owned list of instance addresses that
//! want topology pushes.
//!
//! In Redis the registry is a list keyed by service name whose entries are
//! `address:port` strings. The observer only reads it; service instances add
//! themselves on startup.

use std::sync::Mutex;

use async_trait::async_trait;
use redis::AsyncCommands;

/// Default list key for the booking service.
pub const DEFAULT_SERVICE_NAME: &str = "train_booking_service";

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    #[error("Registry backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for RegistryError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_timeout() {
            RegistryError::Unavailable(e.to_string())
        } else {
            RegistryError::Backend(e.to_string())
        }
    }
}

#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Current members in registry order, duplicates removed.
    async fn members(&self) -> Result<Vec<String>, RegistryError>;

    /// Add `address`. Registering twice leaves a single entry.
    async fn register(&self, address: &str) -> Result<(), RegistryError>;

    /// Remove every entry equal to `address`.
    async fn deregister(&self, address: &str) -> Result<(), RegistryError>;
}

fn dedup_preserving_order(entries: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|entry| !entry.trim().is_empty() && seen.insert(entry.clone()))
        .collect()
}

// ============================================================================
// REDIS
// ============================================================================

pub struct RedisServiceRegistry {
    client: redis::Client,
    key: String,
}

impl RedisServiceRegistry {
    pub fn new(redis_url: &str, key: impl Into<String>) -> Result<Self, RegistryError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            key: key.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, RegistryError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl ServiceRegistry for RedisServiceRegistry {
    async fn members(&self) -> Result<Vec<String>, RegistryError> {
        let mut conn = self.connection().await?;
        // LRANGE <key> 0 -1
        let entries: Vec<String> = conn.lrange(&self.key, 0, -1).await?;
        Ok(dedup_preserving_order(entries))
    }

    async fn register(&self, address: &str) -> Result<(), RegistryError> {
        let mut conn = self.connection().await?;
        // LREM then LPUSH in one MULTI so re-registering never duplicates.
        redis::pipe()
            .atomic()
            .lrem(&self.key, 0, address)
            .ignore()
            .lpush(&self.key, address)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        tracing::info!(key = %self.key, address, "Registered in service registry");
        Ok(())
    }

    async fn deregister(&self, address: &str) -> Result<(), RegistryError> {
        let mut conn = self.connection().await?;
        conn.lrem::<_, _, ()>(&self.key, 0, address).await?;
        tracing::info!(key = %self.key, address, "Deregistered from service registry");
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// Registry held in process, newest registration first like the Redis list.
#[derive(Debug, Default)]
pub struct InMemoryServiceRegistry {
    entries: Mutex<Vec<String>>,
}

impl InMemoryServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: Mutex::new(members.into_iter().map(Into::into).collect()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<String>>, RegistryError> {
        self.entries
            .lock()
            .map_err(|_| RegistryError::Backend("registry lock poisoned".to_string()))
    }
}

#[async_trait]
impl ServiceRegistry for InMemoryServiceRegistry {
    async fn members(&self) -> Result<Vec<String>, RegistryError> {
        Ok(dedup_preserving_order(self.lock()?.clone()))
    }

    async fn register(&self, address: &str) -> Result<(), RegistryError> {
        let mut entries = self.lock()?;
        entries.retain(|entry| entry != address);
        entries.insert(0, address.to_string());
        Ok(())
    }

    async fn deregister(&self, address: &str) -> Result<(), RegistryError> {
        self.lock()?.retain(|entry| entry != address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_is_idempotent() -> Result<(), RegistryError> {
        let registry = InMemoryServiceRegistry::new();
        registry.register("10.0.0.1:8000").await?;
        registry.register("10.0.0.2:8000").await?;
        registry.register("10.0.0.1:8000").await?;

        assert_eq!(
            registry.members().await?,
            vec!["10.0.0.1:8000".to_string(), "10.0.0.2:8000".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_members_drop_duplicates_and_blanks() -> Result<(), RegistryError> {
        let registry = InMemoryServiceRegistry::with_members(["a:1", "", "b:2", "a:1"]);
        assert_eq!(registry.members().await?, vec!["a:1".to_string(), "b:2".to_string()]);

        registry.deregister("a:1").await?;
        assert_eq!(registry.members().await?, vec!["b:2".to_string()]);
        Ok(())
    }

    #[test]
    fn test_redis_registry_rejects_bad_url() {
        assert!(RedisServiceRegistry::new("nope", DEFAULT_SERVICE_NAME).is_err());
    }
}
