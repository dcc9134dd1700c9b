//! REST API Routes Module
//!
//! Includes:
//! - Entity CRUD routes (trains, bookings, lobbies)
//! - Topology push endpoint used by the observer
//! - Health check endpoints (Kubernetes-compatible)
//! - WebSocket relay and Prometheus metrics
//! - CORS support for browser-based clients

pub mod booking;
pub mod health;
pub mod lobby;
pub mod topology;
pub mod train;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware, timeout_middleware};

pub use booking::create_router as booking_router;
pub use health::create_router as health_router;
pub use lobby::create_router as lobby_router;
pub use topology::create_router as topology_router;
pub use train::create_router as train_router;

/// Create the complete API router.
///
/// Layers apply outermost last: CORS, HTTP tracing, request metrics, then the
/// per-request deadline closest to the handlers.
pub fn create_api_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);
    let deadline = state.config.request_timeout;

    let metrics = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone());

    Router::new()
        .merge(health_router(state.clone()))
        .merge(topology_router(state.clone()))
        .merge(train_router(state.clone()))
        .merge(booking_router(state.clone()))
        .merge(lobby_router(state.clone()))
        .merge(crate::ws::create_router(state))
        .merge(metrics)
        .layer(from_fn_with_state(deadline, timeout_middleware))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Empty origin list allows every origin.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!("CORS: allowing origins: {:?}", config.cors_origins);
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let mut config = ApiConfig::in_memory();
        let _ = build_cors_layer(&config);

        config.cors_origins = vec![
            "http://localhost:3000".to_string(),
            "not a header\u{0}".to_string(),
        ];
        let _ = build_cors_layer(&config);
    }
}
