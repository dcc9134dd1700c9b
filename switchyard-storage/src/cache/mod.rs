//! Cache layer: TTL-keyed cache of serialized collections.
//!
//! Collections are cached whole under one fixed key each (see [`keys`]), so
//! any write to a collection invalidates the entire key. Every backend failure
//! degrades to a miss; the cache never fails a request.

pub mod memory;
pub mod read_through;
pub mod redis_backend;
pub mod traits;

pub use memory::InMemoryCacheBackend;
pub use read_through::{CacheConfig, ReadThroughCache};
pub use redis_backend::RedisCacheBackend;
pub use traits::{CacheBackend, CacheError, CacheStats};

/// Fixed cache keys, one per collection kind.
pub mod keys {
    pub const TRAINS: &str = "trains";
    pub const BOOKINGS: &str = "bookings";
    pub const LOBBIES: &str = "lobbies";
}
