//! API Configuration Module
//!
//! Configuration for a service replica: HTTP binding, request deadline, cache
//! and event bus backends, topology persistence, relational sessions and
//! service registration. Loaded from `SWITCHYARD_*` environment variables
//! with defaults suitable for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// DATABASE BACKEND
// ============================================================================

/// Which connector opens relational sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
    /// tokio-postgres, one connection per scoped acquisition.
    Postgres,
    /// In-process tables, for development without a cluster.
    Memory,
}

impl std::str::FromStr for DbBackend {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DbBackend::Postgres),
            "memory" | "mem" => Ok(DbBackend::Memory),
            other => Err(ApiError::invalid_input(format!(
                "Unknown database backend '{}', expected postgres or memory",
                other
            ))),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // HTTP
    // ========================================================================
    pub bind_host: String,
    pub port: u16,

    /// Deadline for every HTTP request. Exceeding it answers 408.
    pub request_timeout: Duration,

    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    // ========================================================================
    // Realtime relay
    // ========================================================================
    /// Per-subscriber queue depth between the relay task and the socket task.
    pub ws_channel_capacity: usize,

    // ========================================================================
    // Cache
    // ========================================================================
    pub cache_ttl: Duration,

    /// Redis URL for the shared cache. Unset uses an in-process cache.
    pub cache_redis_url: Option<String>,

    pub cache_op_timeout: Duration,

    // ========================================================================
    // Event bus
    // ========================================================================
    /// Redis URL for the event exchange. Unset uses an in-process exchange.
    pub bus_redis_url: Option<String>,

    pub bus_exchange: String,

    pub publish_timeout: Duration,

    // ========================================================================
    // Topology and registration
    // ========================================================================
    /// LMDB directory for the topology record. `None` keeps it in memory only.
    pub topology_path: Option<PathBuf>,

    pub registry_url: Option<String>,

    /// Registry list key this replica joins.
    pub service_name: String,

    /// `host:port` other components use to reach this replica.
    pub advertise_addr: Option<String>,

    // ========================================================================
    // Relational sessions
    // ========================================================================
    pub db_backend: DbBackend,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_connect_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout: Duration::from_secs(5),
            cors_origins: Vec::new(),

            ws_channel_capacity: 64,

            cache_ttl: Duration::from_secs(60),
            cache_redis_url: None,
            cache_op_timeout: Duration::from_millis(500),

            bus_redis_url: None,
            bus_exchange: switchyard_events::DEFAULT_EXCHANGE.to_string(),
            publish_timeout: switchyard_events::DEFAULT_PUBLISH_TIMEOUT,

            topology_path: Some(PathBuf::from("./data/topology")),
            registry_url: None,
            service_name: switchyard_storage::DEFAULT_SERVICE_NAME.to_string(),
            advertise_addr: None,

            db_backend: DbBackend::Postgres,
            db_user: "postgres".to_string(),
            db_password: String::new(),
            db_name: "trains".to_string(),
            db_connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Read an optional, non-blank environment variable.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SWITCHYARD_API_BIND`: bind host (default 0.0.0.0)
    /// - `PORT` / `SWITCHYARD_API_PORT`: bind port (default 8000)
    /// - `SWITCHYARD_REQUEST_TIMEOUT_SECS`: request deadline (default 5)
    /// - `SWITCHYARD_CORS_ORIGINS`: comma-separated origins
    /// - `SWITCHYARD_WS_CAPACITY`: subscriber queue depth (default 64)
    /// - `SWITCHYARD_CACHE_TTL_SECS`: list cache TTL (default 60)
    /// - `SWITCHYARD_CACHE_REDIS_URL`, `SWITCHYARD_CACHE_TIMEOUT_MS`
    /// - `SWITCHYARD_BUS_REDIS_URL`, `SWITCHYARD_BUS_EXCHANGE`, `SWITCHYARD_PUBLISH_TIMEOUT_MS`
    /// - `SWITCHYARD_TOPOLOGY_PATH`: LMDB directory, empty for memory only
    /// - `SWITCHYARD_REGISTRY_URL`, `SWITCHYARD_SERVICE_NAME`, `SWITCHYARD_ADVERTISE_ADDR`
    /// - `SWITCHYARD_DB_BACKEND`: postgres or memory
    /// - `SWITCHYARD_DB_USER`, `SWITCHYARD_DB_PASSWORD`, `SWITCHYARD_DB_NAME`,
    ///   `SWITCHYARD_DB_CONNECT_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_host = env_opt("SWITCHYARD_API_BIND").unwrap_or(defaults.bind_host);

        let port = std::env::var("PORT")
            .or_else(|_| std::env::var("SWITCHYARD_API_PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let request_timeout = std::env::var("SWITCHYARD_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let cors_origins = std::env::var("SWITCHYARD_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let ws_channel_capacity = std::env::var("SWITCHYARD_WS_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.ws_channel_capacity);

        let cache_ttl = std::env::var("SWITCHYARD_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let cache_op_timeout = std::env::var("SWITCHYARD_CACHE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.cache_op_timeout);

        let bus_exchange = env_opt("SWITCHYARD_BUS_EXCHANGE").unwrap_or(defaults.bus_exchange);

        let publish_timeout = std::env::var("SWITCHYARD_PUBLISH_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.publish_timeout);

        // Set but empty means "do not persist".
        let topology_path = match std::env::var("SWITCHYARD_TOPOLOGY_PATH") {
            Ok(s) if s.trim().is_empty() => None,
            Ok(s) => Some(PathBuf::from(s.trim())),
            Err(_) => defaults.topology_path,
        };

        let db_backend = std::env::var("SWITCHYARD_DB_BACKEND")
            .ok()
            .and_then(|s| match s.parse() {
                Ok(backend) => Some(backend),
                Err(e) => {
                    tracing::warn!("{}, using postgres", e);
                    None
                }
            })
            .unwrap_or(defaults.db_backend);

        let db_connect_timeout = std::env::var("SWITCHYARD_DB_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.db_connect_timeout);

        Self {
            bind_host,
            port,
            request_timeout,
            cors_origins,
            ws_channel_capacity,
            cache_ttl,
            cache_redis_url: env_opt("SWITCHYARD_CACHE_REDIS_URL"),
            cache_op_timeout,
            bus_redis_url: env_opt("SWITCHYARD_BUS_REDIS_URL"),
            bus_exchange,
            publish_timeout,
            topology_path,
            registry_url: env_opt("SWITCHYARD_REGISTRY_URL"),
            service_name: env_opt("SWITCHYARD_SERVICE_NAME").unwrap_or(defaults.service_name),
            advertise_addr: env_opt("SWITCHYARD_ADVERTISE_ADDR"),
            db_backend,
            db_user: env_opt("SWITCHYARD_DB_USER").unwrap_or(defaults.db_user),
            db_password: std::env::var("SWITCHYARD_DB_PASSWORD").unwrap_or_default(),
            db_name: env_opt("SWITCHYARD_DB_NAME").unwrap_or(defaults.db_name),
            db_connect_timeout,
        }
    }

    /// Everything in memory, nothing persisted. Used by tests and local runs.
    pub fn in_memory() -> Self {
        Self {
            topology_path: None,
            db_backend: DbBackend::Memory,
            ..Self::default()
        }
    }

    /// Resolve the socket address to bind.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        format!("{}:{}", self.bind_host, self.port)
            .parse()
            .map_err(|e| {
                ApiError::invalid_input(format!(
                    "Invalid bind address {}:{}: {}",
                    self.bind_host, self.port, e
                ))
            })
    }

    /// Whether this replica should add itself to the service registry.
    pub fn registration(&self) -> Option<(&str, &str)> {
        match (&self.registry_url, &self.advertise_addr) {
            (Some(url), Some(addr)) => Some((url.as_str(), addr.as_str())),
            _ => None,
        }
    }
}
