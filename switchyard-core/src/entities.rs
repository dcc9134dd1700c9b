//! Booking domain entities and their request payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest allowed train route.
pub const MAX_ROUTE_LEN: usize = 100;

/// Longest allowed user credentials string on a booking.
pub const MAX_CREDENTIALS_LEN: usize = 100;

/// Seat capacity bounds for a train.
pub const MIN_SEATS: i32 = 0;
pub const MAX_SEATS: i32 = 400;

/// Status assigned to new lobbies.
pub const DEFAULT_LOBBY_STATUS: &str = "active";

pub type TrainId = i32;
pub type BookingId = i32;
pub type LobbyId = i32;

// ============================================================================
// TRAINS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Train {
    pub id: TrainId,
    pub route: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub available_seats: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrain {
    pub route: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub available_seats: i32,
}

impl NewTrain {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_route(&self.route)?;
        validate_seats(self.available_seats)
    }

    pub fn into_train(self, id: TrainId) -> Train {
        Train {
            id,
            route: self.route,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            available_seats: self.available_seats,
        }
    }
}

/// Partial train update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainPatch {
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub departure_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub arrival_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub available_seats: Option<i32>,
}

impl TrainPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(route) = &self.route {
            validate_route(route)?;
        }
        if let Some(seats) = self.available_seats {
            validate_seats(seats)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.route.is_none()
            && self.departure_time.is_none()
            && self.arrival_time.is_none()
            && self.available_seats.is_none()
    }

    /// Apply the patch to `train` in place.
    pub fn apply(&self, train: &mut Train) {
        if let Some(route) = &self.route {
            train.route = route.clone();
        }
        if let Some(departure) = self.departure_time {
            train.departure_time = departure;
        }
        if let Some(arrival) = self.arrival_time {
            train.arrival_time = arrival;
        }
        if let Some(seats) = self.available_seats {
            train.available_seats = seats;
        }
    }
}

fn validate_route(route: &str) -> Result<(), ValidationError> {
    if route.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "route".to_string(),
        });
    }
    if route.chars().count() > MAX_ROUTE_LEN {
        return Err(ValidationError::TooLong {
            field: "route".to_string(),
            max: MAX_ROUTE_LEN,
        });
    }
    Ok(())
}

fn validate_seats(seats: i32) -> Result<(), ValidationError> {
    if !(MIN_SEATS..=MAX_SEATS).contains(&seats) {
        return Err(ValidationError::OutOfRange {
            field: "available_seats".to_string(),
            min: i64::from(MIN_SEATS),
            max: i64::from(MAX_SEATS),
        });
    }
    Ok(())
}

// ============================================================================
// BOOKINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub train_id: TrainId,
    pub user_credentials: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub train_id: TrainId,
    pub user_credentials: String,
}

impl NewBooking {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_credentials(&self.user_credentials)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPatch {
    pub user_credentials: String,
}

impl BookingPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_credentials(&self.user_credentials)
    }
}

fn validate_credentials(credentials: &str) -> Result<(), ValidationError> {
    if credentials.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "user_credentials".to_string(),
        });
    }
    if credentials.chars().count() > MAX_CREDENTIALS_LEN {
        return Err(ValidationError::TooLong {
            field: "user_credentials".to_string(),
            max: MAX_CREDENTIALS_LEN,
        });
    }
    Ok(())
}

/// Outcome of a committed booking, used to pick the notification text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingReceipt {
    pub booking: Booking,
    /// Seats left on the train after this booking.
    pub seats_left: i32,
}

/// Outcome of a committed cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationReceipt {
    pub booking: Booking,
    /// Seats left on the train after the seat was returned.
    pub seats_left: i32,
}

// ============================================================================
// LOBBIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    pub id: LobbyId,
    pub train_id: TrainId,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLobby {
    pub train_id: TrainId,
}
