//! Switchyard Core - Value Types
//!
//! Plain data shared by every other crate: cluster topology, booking entities,
//! bus events and the error taxonomy. No I/O lives here.

pub mod entities;
pub mod error;
pub mod event;
pub mod topology;

pub use entities::{
    Booking, BookingId, BookingPatch, BookingReceipt, CancellationReceipt, Lobby, LobbyId,
    NewBooking, NewLobby, NewTrain, Train, TrainId, TrainPatch, DEFAULT_LOBBY_STATUS,
    MAX_CREDENTIALS_LEN, MAX_ROUTE_LEN, MAX_SEATS, MIN_SEATS,
};
pub use error::{
    BusError, StorageError, SwitchyardError, SwitchyardResult, TopologyError, ValidationError,
};
pub use event::ResourceEvent;
pub use topology::{
    ClusterTopology, ConnectionString, ConnectionTemplate, Endpoint, TopologyPush,
    TopologyRecord, TopologySnapshot, DEFAULT_PG_PORT,
};
