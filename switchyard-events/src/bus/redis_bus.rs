//! Redis pub/sub exchange.
//!
//! Routing key `k` on exchange `e` maps to channel `e.k`. Publishing goes over
//! a shared multiplexed connection; every binding opens its own pub/sub
//! connection, which is closed when the binding is dropped.

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use switchyard_core::{BusError, ResourceEvent};
use tokio::sync::Mutex;

use super::{BusBinding, EventBus};

pub struct RedisEventBus {
    client: redis::Client,
    exchange: String,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisEventBus {
    /// Create a bus for `exchange`. Connects lazily on first publish.
    pub fn new(redis_url: &str, exchange: impl Into<String>) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url).map_err(|e| BusError::Unreachable {
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            exchange: exchange.into(),
            conn: Mutex::new(None),
        })
    }

    /// Channel name carrying `routing_key`.
    pub fn channel(&self, routing_key: &str) -> String {
        format!("{}.{}", self.exchange, routing_key)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, BusError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::Unreachable {
                reason: e.to_string(),
            })?;
        *guard = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    fn exchange(&self) -> &str {
        &self.exchange
    }

    async fn publish(&self, routing_key: &str, payload: &str) -> Result<(), BusError> {
        let mut conn = self.connection().await?;
        let channel = self.channel(routing_key);

        let result = redis::cmd("PUBLISH")
            .arg(&channel)
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await;

        if let Err(e) = result {
            if e.is_io_error() || e.is_connection_dropped() {
                *self.conn.lock().await = None;
            }
            return Err(BusError::PublishFailed {
                routing_key: routing_key.to_string(),
                reason: e.to_string(),
            });
        }

        tracing::debug!(channel, "Published event");
        Ok(())
    }

    async fn bind(&self, routing_key: &str) -> Result<BusBinding, BusError> {
        let bind_failed = |e: redis::RedisError| BusError::BindFailed {
            routing_key: routing_key.to_string(),
            reason: e.to_string(),
        };

        let channel = self.channel(routing_key);
        let mut pubsub = self.client.get_async_pubsub().await.map_err(bind_failed)?;
        pubsub.subscribe(&channel).await.map_err(bind_failed)?;
        tracing::debug!(channel, "Subscribed to channel");

        let key = routing_key.to_string();
        let binding = pubsub.into_on_message().filter_map(move |msg| {
            let key = key.clone();
            async move {
                match msg.get_payload::<String>() {
                    Ok(payload) => Some(ResourceEvent::new(key, payload)),
                    Err(e) => {
                        tracing::warn!(routing_key = %key, "Failed to get Pub/Sub payload: {}", e);
                        None
                    }
                }
            }
        });
        Ok(binding.boxed())
    }
}
