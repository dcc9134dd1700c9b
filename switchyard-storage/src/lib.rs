//! Switchyard Storage - Topology, Cache and Registry
//!
//! Local state a service instance keeps next to its relational storage: the
//! persisted topology record, the read-through collection cache, and access to
//! the shared service registry.

pub mod cache;
pub mod registry;
pub mod topology;

pub use cache::{
    keys as cache_keys, CacheBackend, CacheConfig, CacheError, CacheStats, InMemoryCacheBackend,
    ReadThroughCache, RedisCacheBackend,
};
pub use registry::{
    InMemoryServiceRegistry, RedisServiceRegistry, RegistryError, ServiceRegistry,
    DEFAULT_SERVICE_NAME,
};
pub use topology::{
    LmdbTopologyError, LmdbTopologyPersistence, MemoryTopologyPersistence, TopologyPersistence,
    TopologyStore, TOPOLOGY_RECORD_KEY,
};
