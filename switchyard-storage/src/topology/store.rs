//! Per-instance topology store.
//!
//! Single writer (inbound pushes), many readers (every routed request). The
//! current record lives behind an `ArcSwapOption`, so readers never see a
//! primary from one push next to secondaries from another.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use chrono::Utc;
use switchyard_core::{TopologyError, TopologyPush, TopologyRecord, TopologySnapshot};

use super::persistence::{MemoryTopologyPersistence, TopologyPersistence};

pub struct TopologyStore {
    current: ArcSwapOption<TopologyRecord>,
    /// Serializes writers so version assignment and persistence follow arrival order.
    write_lock: Mutex<()>,
    persistence: Box<dyn TopologyPersistence>,
}

impl TopologyStore {
    /// Open a store over `persistence`, loading whatever record it holds.
    pub fn open(persistence: impl TopologyPersistence + 'static) -> Result<Self, TopologyError> {
        let loaded = persistence.load()?;
        match &loaded {
            Some(record) => tracing::info!(
                version = record.version,
                primary = %record.primary.endpoint(),
                secondaries = record.secondaries.len(),
                "Loaded persisted topology"
            ),
            None => tracing::info!("No persisted topology, starting unknown"),
        }

        Ok(Self {
            current: ArcSwapOption::new(loaded.map(Arc::new)),
            write_lock: Mutex::new(()),
            persistence: Box::new(persistence),
        })
    }

    /// A store that forgets its record on restart.
    pub fn in_memory() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            write_lock: Mutex::new(()),
            persistence: Box::new(MemoryTopologyPersistence::new()),
        }
    }

    /// Overwrite the stored record with `push`.
    ///
    /// The whole record is replaced; nothing is merged with the previous one.
    /// Invalid connection strings reject the push and leave the store as it
    /// was. A persistence failure is logged but the new record still becomes
    /// current, since routing on a stale primary is worse than losing the
    /// record across a restart.
    pub fn update(&self, push: &TopologyPush) -> Result<Arc<TopologyRecord>, TopologyError> {
        let (primary, secondaries) = push.validate()?;

        let _guard = self.write_lock.lock().map_err(|_| TopologyError::Persistence {
            reason: "topology write lock poisoned".to_string(),
        })?;

        let version = self
            .current
            .load()
            .as_ref()
            .map(|record| record.version + 1)
            .unwrap_or(1);

        let record = TopologyRecord {
            primary,
            secondaries,
            version,
            received_at: Utc::now(),
        };

        if let Err(e) = self.persistence.save(&record) {
            tracing::error!(version, error = %e, "Failed to persist topology record");
        }

        let record = Arc::new(record);
        self.current.store(Some(Arc::clone(&record)));

        tracing::info!(
            version,
            primary = %record.primary.endpoint(),
            secondaries = record.secondaries.len(),
            "Topology updated"
        );
        Ok(record)
    }

    /// The last accepted record, or `Unknown` if none ever arrived.
    pub fn current(&self) -> TopologySnapshot {
        match self.current.load_full() {
            Some(record) => TopologySnapshot::Known(record),
            None => TopologySnapshot::Unknown,
        }
    }
}
