//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use switchyard_events::{EventBus, EventPublisher, InMemoryEventBus, RedisEventBus, RelayConfig, RelayHub};
use switchyard_storage::{
    CacheBackend, CacheConfig, InMemoryCacheBackend, LmdbTopologyPersistence, ReadThroughCache,
    RedisCacheBackend, TopologyStore,
};

use crate::config::{ApiConfig, DbBackend};
use crate::db::{ConnectionRouter, Connector, MemoryConnector, PgConnector, PgConnectorConfig};
use crate::error::{ApiError, ApiResult};
use crate::services::ServiceContext;
use crate::telemetry::RuntimeGauges;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    /// Current cluster topology, written by `PUT /db`.
    pub topology: Arc<TopologyStore>,
    pub services: ServiceContext,
    pub relay: RelayHub,
    pub start_time: Instant,
}

crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(Arc<TopologyStore>, topology);
crate::impl_from_ref!(ServiceContext, services);
crate::impl_from_ref!(RelayHub, relay);
crate::impl_from_ref!(Instant, start_time);

impl AppState {
    /// Assemble state from already-built backends.
    pub fn new(
        config: ApiConfig,
        topology: Arc<TopologyStore>,
        connector: Arc<dyn Connector>,
        cache_backend: Arc<dyn CacheBackend>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        let router = ConnectionRouter::new(Arc::clone(&topology), connector);
        let cache = ReadThroughCache::new(
            cache_backend,
            CacheConfig::default().with_ttl(config.cache_ttl),
        );
        let publisher = EventPublisher::new(Arc::clone(&bus)).with_timeout(config.publish_timeout);
        let relay = RelayHub::new(
            bus,
            RelayConfig::default().with_channel_capacity(config.ws_channel_capacity),
        );
        let services = ServiceContext::new(router, cache, publisher, config.cache_ttl);

        Self {
            config: Arc::new(config),
            topology,
            services,
            relay,
            start_time: Instant::now(),
        }
    }

    /// Build every backend the configuration asks for.
    pub fn from_config(config: ApiConfig) -> ApiResult<Self> {
        let topology = match &config.topology_path {
            Some(path) => {
                std::fs::create_dir_all(path).map_err(|e| {
                    ApiError::internal_error(format!(
                        "Failed to create topology directory {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let persistence = LmdbTopologyPersistence::open(path).map_err(|e| {
                    ApiError::internal_error(format!("Failed to open topology store: {}", e))
                })?;
                TopologyStore::open(persistence)?
            }
            None => {
                tracing::warn!("No topology path configured, topology will not survive restarts");
                TopologyStore::in_memory()
            }
        };

        let connector: Arc<dyn Connector> = match config.db_backend {
            DbBackend::Postgres => Arc::new(PgConnector::new(PgConnectorConfig {
                user: config.db_user.clone(),
                password: config.db_password.clone(),
                dbname: config.db_name.clone(),
                connect_timeout: config.db_connect_timeout,
            })),
            DbBackend::Memory => {
                tracing::warn!("Using in-memory tables, data is lost on restart");
                Arc::new(MemoryConnector::new())
            }
        };

        let cache_backend: Arc<dyn CacheBackend> = match &config.cache_redis_url {
            Some(url) => Arc::new(
                RedisCacheBackend::new(url, config.cache_op_timeout).map_err(|e| {
                    ApiError::internal_error(format!("Invalid cache Redis URL: {}", e))
                })?,
            ),
            None => Arc::new(InMemoryCacheBackend::new()),
        };

        let bus: Arc<dyn EventBus> = match &config.bus_redis_url {
            Some(url) => Arc::new(
                RedisEventBus::new(url, config.bus_exchange.clone()).map_err(|e| {
                    ApiError::internal_error(format!("Invalid event bus Redis URL: {}", e))
                })?,
            ),
            None => Arc::new(InMemoryEventBus::new(config.bus_exchange.clone())),
        };

        tracing::info!(
            db_backend = ?config.db_backend,
            shared_cache = config.cache_redis_url.is_some(),
            shared_bus = config.bus_redis_url.is_some(),
            "Backends configured"
        );

        Ok(Self::new(config, Arc::new(topology), connector, cache_backend, bus))
    }

    /// Snapshot of state-owned counters for the metrics endpoint.
    pub fn runtime_gauges(&self) -> RuntimeGauges {
        let cache = self.services.cache.stats();
        RuntimeGauges {
            topology_version: self.topology.current().version().unwrap_or(0),
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            cache_errors: cache.errors,
            events_published: self.services.publisher.published_count(),
            event_publish_failures: self.services.publisher.failure_count(),
            active_relays: self.relay.active_relays(),
            relay_subscribers: self.relay.total_subscribers(),
        }
    }
}
