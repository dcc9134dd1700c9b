//! Switchyard Events - Event Bus and Realtime Relay
//!
//! Notifications about resources (a train's seats, its schedule) travel over
//! a routing-keyed bus. The relay hub binds the bus once per resource with
//! live subscribers and fans each event out to all of them.
//!
//! # Key Types
//!
//! - [`EventBus`]: publish/bind contract, with in-process and Redis exchanges
//! - [`EventPublisher`]: fire-and-forget wrapper used after committed writes
//! - [`RelayHub`]: resource id to subscriber set, one relay task each

pub mod bus;
pub mod publisher;
pub mod relay;

pub use bus::{BusBinding, EventBus, InMemoryEventBus, RedisEventBus, DEFAULT_EXCHANGE};
pub use publisher::{EventPublisher, DEFAULT_PUBLISH_TIMEOUT};
pub use relay::{RelayConfig, RelayError, RelayHub, SubscriberHandle, SubscriberId};

pub use switchyard_core::{BusError, ResourceEvent};
