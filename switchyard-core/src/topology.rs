//! Cluster topology value types.
//!
//! An [`Endpoint`] names one database node. A [`ClusterTopology`] is what the
//! observer reads from the cluster manager each poll; a [`TopologyPush`] is its
//! wire form; a [`TopologyRecord`] is what a service instance keeps after
//! accepting a push.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TopologyError;

/// Port assumed when a connection string does not name one.
pub const DEFAULT_PG_PORT: u16 = 5432;

const URL_SCHEMES: [&str; 2] = ["postgresql://", "postgres://"];

// ============================================================================
// ENDPOINT
// ============================================================================

/// A `host:port` pair identifying one node of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_host_port(s, None)
    }
}

/// Split `host[:port]`, falling back to `default_port` when the port is absent.
/// Bracketed IPv6 hosts (`[::1]:5432`) keep their brackets.
fn parse_host_port(s: &str, default_port: Option<u16>) -> Result<Endpoint, TopologyError> {
    let invalid = |reason: &str| TopologyError::InvalidEndpoint {
        value: s.to_string(),
        reason: reason.to_string(),
    };

    let s = s.trim();
    if s.is_empty() {
        return Err(invalid("empty endpoint"));
    }

    let split = if s.ends_with(']') { None } else { s.rsplit_once(':') };

    let (host, port) = match split {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| invalid("port is not a number between 0 and 65535"))?;
            (host, port)
        }
        None => match default_port {
            Some(port) => (s, port),
            None => return Err(invalid("expected host:port")),
        },
    };

    if host.is_empty() {
        return Err(invalid("empty host"));
    }

    Ok(Endpoint::new(host, port))
}

// ============================================================================
// CONNECTION STRING
// ============================================================================

/// A validated database connection string.
///
/// Accepts either a `postgres://` / `postgresql://` URL or a bare `host[:port]`.
/// The raw text is kept verbatim so it round-trips through pushes and the
/// persisted record unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionString {
    raw: String,
    endpoint: Endpoint,
    is_url: bool,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, TopologyError> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| TopologyError::InvalidConnectionString {
            value: raw.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("empty connection string"));
        }

        if let Some(rest) = URL_SCHEMES.iter().find_map(|scheme| trimmed.strip_prefix(scheme)) {
            let authority = rest
                .split(['/', '?'])
                .next()
                .unwrap_or_default();
            let host_port = match authority.rsplit_once('@') {
                Some((_, host_port)) => host_port,
                None => authority,
            };
            let endpoint = parse_host_port(host_port, Some(DEFAULT_PG_PORT))
                .map_err(|e| invalid(&e.to_string()))?;
            return Ok(Self {
                raw: trimmed.to_string(),
                endpoint,
                is_url: true,
            });
        }

        if trimmed.contains("://") {
            return Err(invalid("unsupported scheme, expected postgres:// or postgresql://"));
        }

        let endpoint = parse_host_port(trimmed, Some(DEFAULT_PG_PORT))
            .map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            raw: trimmed.to_string(),
            endpoint,
            is_url: false,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The node this connection string targets.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether the raw form is a full URL (as opposed to a bare `host:port`).
    pub fn is_url(&self) -> bool {
        self.is_url
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for ConnectionString {
    type Error = TopologyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConnectionString> for String {
    fn from(value: ConnectionString) -> Self {
        value.raw
    }
}

/// Renders endpoints into connection strings for pushes.
///
/// The rendered form is `postgresql://{user}:@{host}:{port}/{dbname}`: the
/// password is left empty so credentials come from the consumer's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTemplate {
    pub user: String,
    pub dbname: String,
}

impl ConnectionTemplate {
    pub fn new(user: impl Into<String>, dbname: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            dbname: dbname.into(),
        }
    }

    pub fn render(&self, endpoint: &Endpoint) -> ConnectionString {
        ConnectionString {
            raw: format!(
                "postgresql://{}:@{}:{}/{}",
                self.user, endpoint.host, endpoint.port, self.dbname
            ),
            endpoint: endpoint.clone(),
            is_url: true,
        }
    }
}

// ============================================================================
// CLUSTER TOPOLOGY
// ============================================================================

/// Role assignment observed from the cluster manager in one poll.
///
/// An absent primary means the cluster cannot currently serve writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    pub primary: Option<Endpoint>,
    pub secondaries: Vec<Endpoint>,
}

impl ClusterTopology {
    pub fn new(primary: Endpoint, secondaries: Vec<Endpoint>) -> Self {
        Self {
            primary: Some(primary),
            secondaries,
        }
    }

    /// No primary, no secondaries.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.primary.is_some()
    }

    /// Wire form of this topology, or `None` when no primary is known.
    pub fn to_push(&self, template: &ConnectionTemplate) -> Option<TopologyPush> {
        let primary = self.primary.as_ref()?;
        Some(TopologyPush {
            master_db: template.render(primary).into(),
            slave_dbs: self
                .secondaries
                .iter()
                .map(|s| template.render(s).into())
                .collect(),
        })
    }
}

/// Body of the topology push (`PUT /db`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyPush {
    pub master_db: String,
    #[serde(default)]
    pub slave_dbs: Vec<String>,
}

impl TopologyPush {
    pub fn new(master_db: impl Into<String>, slave_dbs: Vec<String>) -> Self {
        Self {
            master_db: master_db.into(),
            slave_dbs,
        }
    }

    /// Parse every connection string in the push.
    pub fn validate(&self) -> Result<(ConnectionString, Vec<ConnectionString>), TopologyError> {
        let primary = ConnectionString::parse(&self.master_db)?;
        let secondaries = self
            .slave_dbs
            .iter()
            .map(|s| ConnectionString::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((primary, secondaries))
    }
}

// ============================================================================
// TOPOLOGY RECORD
// ============================================================================

/// The last topology an instance accepted, with its local version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyRecord {
    pub primary: ConnectionString,
    pub secondaries: Vec<ConnectionString>,
    /// Monotonic per instance: each accepted push gets previous + 1.
    pub version: u64,
    pub received_at: DateTime<Utc>,
}

impl TopologyRecord {
    pub fn to_push(&self) -> TopologyPush {
        TopologyPush {
            master_db: self.primary.to_string(),
            slave_dbs: self.secondaries.iter().map(ToString::to_string).collect(),
        }
    }
}

/// What `current()` hands to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologySnapshot {
    Known(Arc<TopologyRecord>),
    Unknown,
}

impl TopologySnapshot {
    pub fn record(&self) -> Option<&Arc<TopologyRecord>> {
        match self {
            TopologySnapshot::Known(record) => Some(record),
            TopologySnapshot::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, TopologySnapshot::Known(_))
    }

    pub fn version(&self) -> Option<u64> {
        self.record().map(|r| r.version)
    }
}
