//! Topology push endpoint.
//!
//! The observer PUTs the whole cluster topology here every cycle. The record
//! replaces whatever was stored before; the first record ever accepted also
//! creates the tables on the primary.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::put, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchyard_core::TopologyPush;
use switchyard_storage::TopologyStore;

use crate::db::ConnectionRouter;
use crate::error::{ApiError, ApiResult};
use crate::services::ServiceContext;
use crate::state::AppState;
use crate::telemetry::METRICS;

pub const TOPOLOGY_UPDATED: &str = "Master and slave DB information updated successfully";

/// Upper bound on the schema bootstrap that follows a first push.
const SCHEMA_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyUpdateResponse {
    pub message: String,
    pub version: u64,
}

/// Current record in the same shape the observer pushes, plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyView {
    pub master_db: String,
    pub slave_dbs: Vec<String>,
    pub version: u64,
    pub received_at: DateTime<Utc>,
}

/// PUT /db
pub async fn update_topology(
    State(topology): State<Arc<TopologyStore>>,
    State(services): State<ServiceContext>,
    Json(push): Json<TopologyPush>,
) -> ApiResult<Json<TopologyUpdateResponse>> {
    let first = !topology.current().is_known();

    // The update commits to LMDB synchronously.
    let store = Arc::clone(&topology);
    let pushed = push.clone();
    let updated = tokio::task::spawn_blocking(move || store.update(&pushed))
        .await
        .map_err(|e| ApiError::internal_error(format!("Topology update task failed: {}", e)))?;

    let record = match updated {
        Ok(record) => record,
        Err(e) => {
            if let Ok(metrics) = METRICS.as_ref() {
                metrics.record_topology_push(false, None);
            }
            tracing::warn!(error = %e, master_db = %push.master_db, "Rejected topology push");
            return Err(e.into());
        }
    };
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_topology_push(true, Some(record.version));
    }

    if first {
        bootstrap_schema(&services.router).await;
    }

    Ok(Json(TopologyUpdateResponse {
        message: TOPOLOGY_UPDATED.to_string(),
        version: record.version,
    }))
}

/// GET /db
pub async fn get_topology(State(topology): State<Arc<TopologyStore>>) -> ApiResult<Json<TopologyView>> {
    let snapshot = topology.current();
    let record = snapshot.record().ok_or_else(ApiError::topology_unknown)?;
    let push = record.to_push();
    Ok(Json(TopologyView {
        master_db: push.master_db,
        slave_dbs: push.slave_dbs,
        version: record.version,
        received_at: record.received_at,
    }))
}

/// Create the tables on the primary. Failures are logged; the push stands.
async fn bootstrap_schema(router: &ConnectionRouter) {
    let attempt = async {
        let mut session = router.acquire_write().await.map_err(ApiError::from)?;
        session.ensure_schema().await.map_err(ApiError::from)
    };
    match tokio::time::timeout(SCHEMA_BOOTSTRAP_TIMEOUT, attempt).await {
        Ok(Ok(())) => tracing::info!("Database schema ensured on primary"),
        Ok(Err(e)) => tracing::error!(error = %e, "Schema bootstrap failed"),
        Err(_) => tracing::error!("Schema bootstrap timed out"),
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/db", put(update_topology).get(get_topology))
        .with_state(state)
}
