//! Durable storage for the topology record.

use std::sync::Mutex;

use switchyard_core::{TopologyError, TopologyRecord};

/// Fixed key the topology record is stored under.
pub const TOPOLOGY_RECORD_KEY: &str = "db_connections";

/// Loads and saves the single topology record of an instance.
///
/// Calls are synchronous and small; callers on the async runtime should run
/// them off the reactor if the backend touches disk.
pub trait TopologyPersistence: Send + Sync {
    /// The last saved record, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<TopologyRecord>, TopologyError>;

    /// Replace the saved record.
    fn save(&self, record: &TopologyRecord) -> Result<(), TopologyError>;
}

/// Keeps the record in memory only. Used when no store path is configured.
#[derive(Debug, Default)]
pub struct MemoryTopologyPersistence {
    record: Mutex<Option<TopologyRecord>>,
}

impl MemoryTopologyPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TopologyPersistence for MemoryTopologyPersistence {
    fn load(&self) -> Result<Option<TopologyRecord>, TopologyError> {
        let guard = self.record.lock().map_err(|_| TopologyError::Persistence {
            reason: "topology record lock poisoned".to_string(),
        })?;
        Ok(guard.clone())
    }

    fn save(&self, record: &TopologyRecord) -> Result<(), TopologyError> {
        let mut guard = self.record.lock().map_err(|_| TopologyError::Persistence {
            reason: "topology record lock poisoned".to_string(),
        })?;
        *guard = Some(record.clone());
        Ok(())
    }
}
