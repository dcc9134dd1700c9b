//! Prometheus Metrics Definitions
//!
//! Counters are updated where things happen (requests, session opens,
//! topology pushes). Gauges that mirror state owned elsewhere (cache counters,
//! relay registry) are refreshed from a [`RuntimeGauges`] snapshot on scrape.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<SwitchyardMetrics>> = Lazy::new(SwitchyardMetrics::new);

#[derive(Clone)]
pub struct SwitchyardMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Session acquisitions - labels: role, outcome
    pub db_sessions_total: CounterVec,

    /// Inbound topology pushes - labels: outcome (accepted/rejected)
    pub topology_pushes_total: CounterVec,

    /// Version of the topology record currently routed on (0 = unknown)
    pub topology_version: Gauge,

    pub cache_hits: Gauge,
    pub cache_misses: Gauge,
    pub cache_errors: Gauge,

    pub events_published: Gauge,
    pub event_publish_failures: Gauge,

    /// Resources with a running relay task
    pub active_relays: Gauge,

    /// Subscribers attached across all resources
    pub relay_subscribers: Gauge,

    /// Current open WebSocket connections
    pub websocket_connections: Gauge,
}

/// Values copied into gauges on every scrape.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuntimeGauges {
    pub topology_version: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub events_published: u64,
    pub event_publish_failures: u64,
    pub active_relays: usize,
    pub relay_subscribers: usize,
}

impl SwitchyardMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "switchyard_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "switchyard_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            db_sessions_total: register_counter_vec!(
                "switchyard_db_sessions_total",
                "Database sessions opened by the connection router",
                &["role", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register db_sessions_total: {}", e)))?,

            topology_pushes_total: register_counter_vec!(
                "switchyard_topology_pushes_total",
                "Topology pushes received from the observer",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register topology_pushes_total: {}", e)))?,

            topology_version: register_gauge!(
                "switchyard_topology_version",
                "Version of the current topology record, 0 when unknown"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register topology_version: {}", e)))?,

            cache_hits: register_gauge!("switchyard_cache_hits", "Read-through cache hits")
                .map_err(|e| ApiError::internal_error(format!("Failed to register cache_hits: {}", e)))?,

            cache_misses: register_gauge!("switchyard_cache_misses", "Read-through cache misses")
                .map_err(|e| ApiError::internal_error(format!("Failed to register cache_misses: {}", e)))?,

            cache_errors: register_gauge!(
                "switchyard_cache_errors",
                "Cache backend errors absorbed by failing open"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_errors: {}", e)))?,

            events_published: register_gauge!(
                "switchyard_events_published",
                "Events accepted by the bus"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register events_published: {}", e)))?,

            event_publish_failures: register_gauge!(
                "switchyard_event_publish_failures",
                "Events the bus did not accept"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register event_publish_failures: {}", e)))?,

            active_relays: register_gauge!(
                "switchyard_active_relays",
                "Resources with a running relay task"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register active_relays: {}", e)))?,

            relay_subscribers: register_gauge!(
                "switchyard_relay_subscribers",
                "Realtime subscribers attached across all resources"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register relay_subscribers: {}", e)))?,

            websocket_connections: register_gauge!(
                "switchyard_websocket_connections",
                "Current number of active WebSocket connections"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register websocket_connections: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_db_session(&self, role: &str, outcome: &str) {
        self.db_sessions_total
            .with_label_values(&[role, outcome])
            .inc();
    }

    pub fn record_topology_push(&self, accepted: bool, version: Option<u64>) {
        let outcome = if accepted { "accepted" } else { "rejected" };
        self.topology_pushes_total.with_label_values(&[outcome]).inc();
        if let Some(version) = version {
            self.topology_version.set(version as f64);
        }
    }

    pub fn ws_connected(&self) {
        self.websocket_connections.inc();
    }

    pub fn ws_disconnected(&self) {
        self.websocket_connections.dec();
    }

    /// Copy a runtime snapshot into the mirrored gauges.
    pub fn observe(&self, gauges: &RuntimeGauges) {
        self.topology_version.set(gauges.topology_version as f64);
        self.cache_hits.set(gauges.cache_hits as f64);
        self.cache_misses.set(gauges.cache_misses as f64);
        self.cache_errors.set(gauges.cache_errors as f64);
        self.events_published.set(gauges.events_published as f64);
        self.event_publish_failures
            .set(gauges.event_publish_failures as f64);
        self.active_relays.set(gauges.active_relays as f64);
        self.relay_subscribers.set(gauges.relay_subscribers as f64);
    }
}

/// Handler for GET /metrics.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.observe(&state.runtime_gauges());
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_http_request() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_http_request("GET", "/trains/{id}", 200, 0.015);
        let count = metrics
            .http_requests_total
            .with_label_values(&["GET", "/trains/{id}", "200"])
            .get();
        assert!(count >= 1.0);
        Ok(())
    }

    #[test]
    fn test_record_topology_push() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_topology_push(true, Some(7));
        assert!(metrics.topology_pushes_total.with_label_values(&["accepted"]).get() >= 1.0);
        metrics.record_topology_push(false, None);
        assert!(metrics.topology_pushes_total.with_label_values(&["rejected"]).get() >= 1.0);
        Ok(())
    }

    #[test]
    fn test_observe_mirrors_snapshot() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        let gauges = RuntimeGauges {
            cache_hits: 3,
            active_relays: 2,
            relay_subscribers: 5,
            ..RuntimeGauges::default()
        };
        metrics.observe(&gauges);
        assert_eq!(metrics.cache_hits.get(), 3.0);
        assert_eq!(metrics.relay_subscribers.get(), 5.0);
        Ok(())
    }
}
