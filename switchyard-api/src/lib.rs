//! Switchyard API - Service Replica
//!
//! One stateless replica of the train booking service. It exposes REST
//! endpoints (Axum) for trains, bookings and lobbies, accepts topology pushes
//! from the observer, and relays resource events to WebSocket subscribers.
//!
//! Every request acquires a database session through the
//! [`ConnectionRouter`]: writes go to the current primary, reads to a random
//! secondary. Collection reads go through the read-through cache and are
//! invalidated by committed writes.

pub mod config;
pub mod db;
pub mod error;
pub mod macros;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod ws;

// Re-export commonly used types
pub use config::{ApiConfig, DbBackend};
pub use db::{
    ConnectionRouter, Connector, DbSession, MemoryConnector, PgConnector, PgConnectorConfig, Role,
    ScopedSession,
};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use services::ServiceContext;
pub use state::AppState;
