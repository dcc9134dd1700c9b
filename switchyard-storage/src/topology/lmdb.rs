//! LMDB-backed topology persistence.
//!
//! Uses heed to keep the topology record in a small memory-mapped database so
//! a restarted instance can route immediately, before the next push arrives.
//! The record is stored as JSON under [`TOPOLOGY_RECORD_KEY`].

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use switchyard_core::{TopologyError, TopologyRecord};

use super::persistence::{TopologyPersistence, TOPOLOGY_RECORD_KEY};

/// Map size for the topology environment. One record needs a few KB.
const MAP_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Error type for LMDB persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbTopologyError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbTopologyError> for TopologyError {
    fn from(e: LmdbTopologyError) -> Self {
        TopologyError::Persistence {
            reason: e.to_string(),
        }
    }
}

pub struct LmdbTopologyPersistence {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbTopologyPersistence {
    /// Open (creating if needed) the topology environment in `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LmdbTopologyError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment directory is owned by this process; no other
        // code opens it with different flags.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE_BYTES)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbTopologyError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbTopologyError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("topology"))
            .map_err(|e| LmdbTopologyError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbTopologyError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    fn read(&self) -> Result<Option<TopologyRecord>, LmdbTopologyError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbTopologyError::Transaction(e.to_string()))?;

        let bytes = self
            .db
            .get(&rtxn, TOPOLOGY_RECORD_KEY.as_bytes())
            .map_err(|e| LmdbTopologyError::Transaction(e.to_string()))?;

        match bytes {
            Some(bytes) => serde_json::from_slice(bytes)
                .map(Some)
                .map_err(|e| LmdbTopologyError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn write(&self, record: &TopologyRecord) -> Result<(), LmdbTopologyError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| LmdbTopologyError::Serialization(e.to_string()))?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbTopologyError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, TOPOLOGY_RECORD_KEY.as_bytes(), &bytes)
            .map_err(|e| LmdbTopologyError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbTopologyError::Transaction(e.to_string()))
    }
}

impl TopologyPersistence for LmdbTopologyPersistence {
    fn load(&self) -> Result<Option<TopologyRecord>, TopologyError> {
        Ok(self.read()?)
    }

    fn save(&self, record: &TopologyRecord) -> Result<(), TopologyError> {
        Ok(self.write(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use switchyard_core::ConnectionString;

    fn record(version: u64) -> Result<TopologyRecord, TopologyError> {
        Ok(TopologyRecord {
            primary: ConnectionString::parse("m:5432")?,
            secondaries: vec![ConnectionString::parse("s1:5432")?],
            version,
            received_at: Utc::now(),
        })
    }

    #[test]
    fn test_empty_environment_loads_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let persistence = LmdbTopologyPersistence::open(dir.path())?;
        assert!(persistence.load()?.is_none());
        Ok(())
    }

    #[test]
    fn test_record_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let saved = record(3)?;
        {
            let persistence = LmdbTopologyPersistence::open(dir.path())?;
            persistence.save(&record(2)?)?;
            persistence.save(&saved)?;
        }

        let reopened = LmdbTopologyPersistence::open(dir.path())?;
        assert_eq!(reopened.load()?, Some(saved));
        Ok(())
    }
}
