//! Routing-keyed publish/subscribe.
//!
//! One shared direct exchange: a message published with routing key `k`
//! reaches exactly the bindings made for `k`. Payloads are plain text.

mod memory;
mod redis_bus;

pub use memory::InMemoryEventBus;
pub use redis_bus::RedisEventBus;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use switchyard_core::{BusError, ResourceEvent};

/// Default exchange name shared by every producer and relay.
pub const DEFAULT_EXCHANGE: &str = "train_events";

/// Stream of events delivered to one binding, in publish order for a single
/// producer. Dropping it removes the binding.
pub type BusBinding = BoxStream<'static, ResourceEvent>;

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Name of the exchange this bus publishes to.
    fn exchange(&self) -> &str;

    /// Deliver `payload` to every binding on `routing_key`. With no bindings
    /// the message is dropped.
    async fn publish(&self, routing_key: &str, payload: &str) -> Result<(), BusError>;

    /// Create a binding that receives only messages for `routing_key`.
    async fn bind(&self, routing_key: &str) -> Result<BusBinding, BusError>;
}
