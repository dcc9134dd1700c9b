//! Domain Services
//!
//! Business logic for trains, bookings and lobbies. Reads of whole
//! collections go through the read-through cache; every committed write
//! invalidates the collections it changed and then publishes its notification
//! on the bus, keyed by train id. Both steps happen after the commit and
//! neither can fail the request.

pub mod bookings;
pub mod lobbies;
pub mod trains;

use std::time::Duration;

use switchyard_events::EventPublisher;
use switchyard_storage::ReadThroughCache;

use crate::db::ConnectionRouter;

/// Everything a service operation touches.
#[derive(Clone)]
pub struct ServiceContext {
    pub router: ConnectionRouter,
    pub cache: ReadThroughCache,
    pub publisher: EventPublisher,
    pub cache_ttl: Duration,
}

impl ServiceContext {
    pub fn new(
        router: ConnectionRouter,
        cache: ReadThroughCache,
        publisher: EventPublisher,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            router,
            cache,
            publisher,
            cache_ttl,
        }
    }
}
