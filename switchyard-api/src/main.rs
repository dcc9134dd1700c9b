//! Switchyard API Server Entry Point
//!
//! Bootstraps configuration, registers the replica in the service registry
//! when asked to, and starts the Axum HTTP server.

use switchyard_api::telemetry::{init_tracer, TelemetryConfig};
use switchyard_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};
use switchyard_storage::{RedisServiceRegistry, ServiceRegistry};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let config = ApiConfig::from_env();
    let addr = config.bind_addr()?;
    let registration = config
        .registration()
        .map(|(url, advertise)| (url.to_string(), advertise.to_string()));
    let service_name = config.service_name.clone();

    let state = AppState::from_config(config)?;
    let relay = state.relay.clone();
    let app = create_api_router(state);

    let registry = match &registration {
        Some((url, advertise)) => match RedisServiceRegistry::new(url, service_name.as_str()) {
            Ok(registry) => {
                if let Err(e) = registry.register(advertise).await {
                    tracing::warn!(error = %e, advertise = %advertise, "Service registration failed");
                }
                Some((registry, advertise.clone()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Invalid registry URL, skipping registration");
                None
            }
        },
        None => None,
    };

    tracing::info!(%addr, service = %service_name, "Starting Switchyard API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    if let Some((registry, advertise)) = registry {
        if let Err(e) = registry.deregister(&advertise).await {
            tracing::warn!(error = %e, "Service deregistration failed");
        }
    }
    relay.shutdown();

    Ok(())
}
