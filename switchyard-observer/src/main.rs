//! Switchyard Observer Entry Point

use std::sync::Arc;

use switchyard_observer::{
    HttpTopologyPusher, Observer, ObserverConfig, ObserverError, ObserverResult, PgAutoctlManager,
};
use switchyard_storage::RedisServiceRegistry;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "switchyard_observer=info,info";

fn init_tracing() -> ObserverResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    let json = std::env::var("SWITCHYARD_LOG_JSON")
        .map(|s| s == "true" || s == "1")
        .unwrap_or(false);

    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| ObserverError::Config(format!("Failed to init subscriber: {}", e)))
}

#[tokio::main]
async fn main() -> ObserverResult<()> {
    init_tracing()?;

    let config = ObserverConfig::from_env();
    let manager = PgAutoctlManager::new(&config.autoctl_command, config.command_timeout)?;
    let registry = RedisServiceRegistry::new(&config.registry_url, config.registry_key.clone())?;
    let pusher = HttpTopologyPusher::new(config.push_timeout)?;

    tracing::info!(
        command = %config.autoctl_command.join(" "),
        registry_key = %config.registry_key,
        "Starting topology observer"
    );

    let observer = Observer::new(
        Arc::new(manager),
        Arc::new(registry),
        Arc::new(pusher),
        config.template(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(observer.run(config.poll_interval, shutdown_rx));

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    if let Err(e) = handle.await {
        tracing::error!(error = %e, "Observer task ended abnormally");
    }
    Ok(())
}
