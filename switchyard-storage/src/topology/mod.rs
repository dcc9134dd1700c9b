//! Topology store and its persistence backends.

pub mod lmdb;
pub mod persistence;
pub mod store;

pub use lmdb::{LmdbTopologyError, LmdbTopologyPersistence};
pub use persistence::{MemoryTopologyPersistence, TopologyPersistence, TOPOLOGY_RECORD_KEY};
pub use store::TopologyStore;
