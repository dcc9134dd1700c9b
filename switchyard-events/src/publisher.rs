//! Best-effort publishing for the write path.
//!
//! A committed write is never rolled back because its notification could not be
//! sent, so publish failures are logged and counted here instead of returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use switchyard_core::BusError;

use crate::bus::EventBus;

pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    timeout: Duration,
    published: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl EventPublisher {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self {
            bus,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
            published: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    /// Publish `payload` on `routing_key`. Returns whether the bus accepted it.
    pub async fn publish_best_effort(&self, routing_key: &str, payload: &str) -> bool {
        let outcome = match tokio::time::timeout(self.timeout, self.bus.publish(routing_key, payload)).await {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout {
                routing_key: routing_key.to_string(),
            }),
        };

        match outcome {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    routing_key,
                    exchange = self.bus.exchange(),
                    error = %e,
                    "Event publish failed, continuing"
                );
                false
            }
        }
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
