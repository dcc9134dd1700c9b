//! Health Check Endpoints
//!
//! - /status - Service banner
//! - /health/live - Process alive check
//! - /health/ready - Ready once a primary is known
//!
//! A replica that has never received a topology push cannot route a single
//! query, so readiness is tied to the topology store rather than to a
//! database round trip.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use switchyard_storage::TopologyStore;

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub topology: TopologyHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_version: Option<u64>,
    pub secondaries: usize,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /status
pub async fn status() -> impl IntoResponse {
    Json(StatusResponse {
        status: "OK".to_string(),
        message: "Train booking service is running".to_string(),
    })
}

/// GET /health/live
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready
pub async fn readiness(
    State(topology): State<Arc<TopologyStore>>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let snapshot = topology.current();
    let topology_health = match snapshot.record() {
        Some(record) => TopologyHealth {
            status: HealthStatus::Healthy,
            record_version: Some(record.version),
            secondaries: record.secondaries.len(),
        },
        None => TopologyHealth {
            status: HealthStatus::Unhealthy,
            record_version: None,
            secondaries: 0,
        },
    };

    let overall_status = topology_health.status;
    let response = HealthResponse {
        status: overall_status,
        message: (overall_status == HealthStatus::Unhealthy)
            .then(|| "Waiting for the first topology push".to_string()),
        details: Some(HealthDetails {
            topology: topology_health,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if overall_status == HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .with_state(state)
}
