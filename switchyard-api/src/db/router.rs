//! Topology-aware connection routing.
//!
//! Writes go to the current primary, reads to a uniformly random secondary
//! (the primary when there are none). The topology is read at acquisition
//! time and never cached here, so the next acquisition after a push already
//! lands on the new nodes.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use rand::seq::IndexedRandom;
use switchyard_core::{ConnectionString, Endpoint, SwitchyardError, TopologyError, TopologyRecord};
use switchyard_storage::TopologyStore;

use super::{Connector, DbSession};
use crate::telemetry::METRICS;

/// Which side of the cluster a session was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Primary,
    Secondary,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct ConnectionRouter {
    topology: Arc<TopologyStore>,
    connector: Arc<dyn Connector>,
}

impl ConnectionRouter {
    pub fn new(topology: Arc<TopologyStore>, connector: Arc<dyn Connector>) -> Self {
        Self {
            topology,
            connector,
        }
    }

    pub fn topology(&self) -> &Arc<TopologyStore> {
        &self.topology
    }

    /// Open a session on the current primary.
    pub async fn acquire_write(&self) -> Result<ScopedSession, SwitchyardError> {
        let record = self.record()?;
        self.open(record.primary.clone(), Role::Primary, record.version)
            .await
    }

    /// Open a session on a random secondary, or the primary if there is none.
    pub async fn acquire_read(&self) -> Result<ScopedSession, SwitchyardError> {
        let record = self.record()?;
        let (target, role) = read_target(&record);
        self.open(target, role, record.version).await
    }

    fn record(&self) -> Result<Arc<TopologyRecord>, SwitchyardError> {
        match self.topology.current().record() {
            Some(record) => Ok(Arc::clone(record)),
            None => {
                tracing::warn!("Rejecting database access: topology unknown");
                Err(TopologyError::Unknown.into())
            }
        }
    }

    async fn open(
        &self,
        target: ConnectionString,
        role: Role,
        version: u64,
    ) -> Result<ScopedSession, SwitchyardError> {
        let endpoint = target.endpoint().clone();
        match self.connector.connect(&target).await {
            Ok(session) => {
                if let Ok(metrics) = METRICS.as_ref() {
                    metrics.record_db_session(role.as_str(), "ok");
                }
                tracing::debug!(endpoint = %endpoint, role = %role, version, "Acquired database session");
                Ok(ScopedSession {
                    session,
                    endpoint,
                    role,
                    acquired_at: Instant::now(),
                })
            }
            Err(e) => {
                if let Ok(metrics) = METRICS.as_ref() {
                    metrics.record_db_session(role.as_str(), "error");
                }
                tracing::warn!(endpoint = %endpoint, role = %role, version, error = %e, "Failed to open database session");
                Err(e.into())
            }
        }
    }
}

fn read_target(record: &TopologyRecord) -> (ConnectionString, Role) {
    match record.secondaries.choose(&mut rand::rng()) {
        Some(secondary) => (secondary.clone(), Role::Secondary),
        None => (record.primary.clone(), Role::Primary),
    }
}

/// A session bound to one node for the duration of a scope.
///
/// Dropping the guard releases the connection, on every exit path.
pub struct ScopedSession {
    session: Box<dyn DbSession>,
    endpoint: Endpoint,
    role: Role,
    acquired_at: Instant,
}

impl ScopedSession {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl Deref for ScopedSession {
    type Target = dyn DbSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for ScopedSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        tracing::debug!(
            endpoint = %self.endpoint,
            role = %self.role,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Released database session"
        );
    }
}
