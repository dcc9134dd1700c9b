//! Relational sessions and topology-aware routing.
//!
//! A [`DbSession`] is one open connection to one cluster node, carrying the
//! domain operations the services need. A [`Connector`] opens sessions against
//! a connection string; the [`ConnectionRouter`] decides which node to open
//! them on and hands them out as [`ScopedSession`] guards.

pub mod memory;
pub mod postgres;
pub mod router;

use async_trait::async_trait;
use switchyard_core::{
    Booking, BookingId, BookingPatch, BookingReceipt, CancellationReceipt, ConnectionString,
    Lobby, LobbyId, NewBooking, NewLobby, NewTrain, StorageError, Train, TrainId, TrainPatch,
};

pub use memory::MemoryConnector;
pub use postgres::{PgConnector, PgConnectorConfig};
pub use router::{ConnectionRouter, Role, ScopedSession};

/// Tables every replica expects on the primary. Idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS trains (
    id SERIAL PRIMARY KEY,
    route VARCHAR(100) NOT NULL,
    departure_time TIMESTAMPTZ NOT NULL,
    arrival_time TIMESTAMPTZ NOT NULL,
    available_seats INTEGER NOT NULL CHECK (available_seats >= 0 AND available_seats <= 400)
);
CREATE INDEX IF NOT EXISTS idx_trains_route ON trains (route);

CREATE TABLE IF NOT EXISTS bookings (
    id SERIAL PRIMARY KEY,
    train_id INTEGER NOT NULL REFERENCES trains (id) ON DELETE CASCADE,
    user_credentials VARCHAR(100) NOT NULL,
    UNIQUE (train_id, user_credentials)
);

CREATE TABLE IF NOT EXISTS lobbies (
    id SERIAL PRIMARY KEY,
    train_id INTEGER NOT NULL UNIQUE,
    status VARCHAR(32) NOT NULL DEFAULT 'active'
);
"#;

/// One open connection to one node.
///
/// Multi-statement operations (`book_seat`, `cancel_booking`) run in a single
/// transaction: either every row changes or none does.
#[async_trait]
pub trait DbSession: Send {
    /// Create the tables if they do not exist yet.
    async fn ensure_schema(&mut self) -> Result<(), StorageError>;

    async fn list_trains(&mut self) -> Result<Vec<Train>, StorageError>;
    async fn get_train(&mut self, id: TrainId) -> Result<Train, StorageError>;
    async fn insert_train(&mut self, new: &NewTrain) -> Result<Train, StorageError>;

    /// Apply `patch`, returning the train before and after.
    async fn update_train(
        &mut self,
        id: TrainId,
        patch: &TrainPatch,
    ) -> Result<(Train, Train), StorageError>;

    /// Delete a train and, with it, its bookings.
    async fn delete_train(&mut self, id: TrainId) -> Result<Train, StorageError>;

    async fn list_bookings(&mut self) -> Result<Vec<Booking>, StorageError>;
    async fn get_booking(&mut self, id: BookingId) -> Result<Booking, StorageError>;

    /// Take one seat on the train and record the booking.
    ///
    /// Fails with `NotFound` if the train does not exist and `Conflict` if the
    /// user already holds a booking on it or no seats are left.
    async fn book_seat(&mut self, new: &NewBooking) -> Result<BookingReceipt, StorageError>;

    async fn update_booking(
        &mut self,
        id: BookingId,
        patch: &BookingPatch,
    ) -> Result<Booking, StorageError>;

    /// Delete the booking and give its seat back to the train.
    async fn cancel_booking(&mut self, id: BookingId) -> Result<CancellationReceipt, StorageError>;

    async fn list_lobbies(&mut self) -> Result<Vec<Lobby>, StorageError>;
    async fn get_lobby(&mut self, id: LobbyId) -> Result<Lobby, StorageError>;

    /// Fails with `Conflict` if a lobby for the train already exists.
    async fn insert_lobby(&mut self, new: &NewLobby) -> Result<Lobby, StorageError>;

    async fn delete_lobby(&mut self, id: LobbyId) -> Result<Lobby, StorageError>;
}

/// Opens sessions. No connection outlives the session it backs.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &ConnectionString) -> Result<Box<dyn DbSession>, StorageError>;
}

pub(crate) fn not_found(entity: &'static str, id: i32) -> StorageError {
    StorageError::NotFound {
        entity,
        id: i64::from(id),
    }
}
