//! In-process exchange built on per-key broadcast channels.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use switchyard_core::{BusError, ResourceEvent};
use tokio::sync::broadcast;

use super::{BusBinding, EventBus, DEFAULT_EXCHANGE};

const DEFAULT_BINDING_CAPACITY: usize = 256;

pub struct InMemoryEventBus {
    exchange: String,
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<ResourceEvent>>>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EXCHANGE)
    }
}

impl InMemoryEventBus {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            capacity: DEFAULT_BINDING_CAPACITY,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Per-binding buffer. A binding that falls this far behind skips ahead.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Number of live bindings on `routing_key`.
    pub fn binding_count(&self, routing_key: &str) -> usize {
        self.channels
            .lock()
            .ok()
            .and_then(|channels| channels.get(routing_key).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }

    /// End every binding on `routing_key`, as if the broker connection dropped.
    pub fn close_bindings(&self, routing_key: &str) {
        if let Ok(mut channels) = self.channels.lock() {
            channels.remove(routing_key);
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<ResourceEvent>>>, BusError>
    {
        self.channels.lock().map_err(|_| BusError::Unreachable {
            reason: "exchange lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    fn exchange(&self) -> &str {
        &self.exchange
    }

    async fn publish(&self, routing_key: &str, payload: &str) -> Result<(), BusError> {
        let mut channels = self.lock()?;
        let Some(tx) = channels.get(routing_key) else {
            tracing::trace!(routing_key, "No bindings, message dropped");
            return Ok(());
        };

        if tx.send(ResourceEvent::new(routing_key, payload)).is_err() {
            // Every binding went away since the last publish.
            channels.remove(routing_key);
            tracing::trace!(routing_key, "No bindings, message dropped");
        }
        Ok(())
    }

    async fn bind(&self, routing_key: &str) -> Result<BusBinding, BusError> {
        let rx = {
            let mut channels = self.lock()?;
            channels
                .entry(routing_key.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let key = routing_key.to_string();
        let binding = stream::unfold(rx, move |mut rx| {
            let key = key.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => return Some((event, rx)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(routing_key = %key, skipped, "Binding lagged, messages skipped");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });
        Ok(binding.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exact_key_routing() -> Result<(), BusError> {
        let bus = InMemoryEventBus::default();
        let mut trains_42 = bus.bind("42").await?;
        let mut trains_421 = bus.bind("421").await?;

        bus.publish("42", "hello").await?;
        bus.publish("421", "other").await?;

        assert_eq!(trains_42.next().await.map(|e| e.payload), Some("hello".to_string()));
        assert_eq!(trains_421.next().await.map(|e| e.payload), Some("other".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_publish_without_bindings_is_dropped() -> Result<(), BusError> {
        let bus = InMemoryEventBus::default();
        bus.publish("7", "nobody listens").await?;

        let mut binding = bus.bind("7").await?;
        bus.publish("7", "now").await?;
        assert_eq!(binding.next().await.map(|e| e.payload), Some("now".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_fifo_per_key() -> Result<(), BusError> {
        let bus = InMemoryEventBus::default();
        let mut binding = bus.bind("1").await?;
        for i in 0..20 {
            bus.publish("1", &i.to_string()).await?;
        }
        for i in 0..20 {
            assert_eq!(binding.next().await.map(|e| e.payload), Some(i.to_string()));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_binding_count_tracks_drops() -> Result<(), BusError> {
        let bus = InMemoryEventBus::default();
        let a = bus.bind("9").await?;
        let b = bus.bind("9").await?;
        assert_eq!(bus.binding_count("9"), 2);
        drop(a);
        assert_eq!(bus.binding_count("9"), 1);
        drop(b);
        assert_eq!(bus.binding_count("9"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_close_bindings_ends_stream() -> Result<(), BusError> {
        let bus = InMemoryEventBus::default();
        let mut binding = bus.bind("3").await?;
        bus.close_bindings("3");
        assert!(binding.next().await.is_none());
        Ok(())
    }
}
