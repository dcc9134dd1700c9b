//! Resource events and the notification texts carried on the bus.
//!
//! Event kinds share one exchange and are told apart only by their text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Train, TrainPatch};

/// One message on the event bus. Transient: never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
    /// Stringified resource id (train id, lobby id).
    pub routing_key: String,
    /// Plain-text body, no envelope.
    pub payload: String,
    pub published_at: DateTime<Utc>,
}

impl ResourceEvent {
    pub fn new(routing_key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            routing_key: routing_key.into(),
            payload: payload.into(),
            published_at: Utc::now(),
        }
    }
}

// ============================================================================
// NOTIFICATION TEXTS
// ============================================================================

pub fn booking_registered(user: &str, seats_left: i32) -> String {
    format!("A booking was registered for {user}.\nAvailable seats: {seats_left}\n")
}

pub fn seats_exhausted(user: &str) -> String {
    format!("A booking was registered for {user}.\nThere are no more seats left.\n")
}

pub fn booking_cancelled(user: &str, seats_left: i32) -> String {
    format!("A booking was cancelled by {user}.\nAvailable seats: {seats_left}\n")
}

pub fn train_removed() -> String {
    "Train you were tracking was removed from the schedule. It was registered by mistake.\n"
        .to_string()
}

/// Describe `patch` against the train as it was before the update.
pub fn train_updated(before: &Train, patch: &TrainPatch) -> String {
    let mut message = String::from("Train details were updated:\n");
    if let Some(route) = &patch.route {
        message.push_str(&format!("{} -> {}\n", before.route, route));
    }
    if let Some(departure) = patch.departure_time {
        message.push_str(&format!(
            "Departure time: {} -> {}\n",
            before.departure_time, departure
        ));
    }
    if let Some(arrival) = patch.arrival_time {
        message.push_str(&format!(
            "Arrival time: {} -> {}\n",
            before.arrival_time, arrival
        ));
    }
    if let Some(seats) = patch.available_seats {
        message.push_str(&format!(
            "Available seats: {} -> {}\n",
            before.available_seats, seats
        ));
    }
    message
}

/// Greeting sent to a subscriber right after it attaches to a resource.
pub fn welcome(resource_id: &str) -> String {
    format!("Connected to updates for {resource_id}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_texts() {
        assert_eq!(
            booking_registered("ana", 3),
            "A booking was registered for ana.\nAvailable seats: 3\n"
        );
        assert_eq!(
            seats_exhausted("ana"),
            "A booking was registered for ana.\nThere are no more seats left.\n"
        );
        assert_eq!(
            booking_cancelled("ana", 4),
            "A booking was cancelled by ana.\nAvailable seats: 4\n"
        );
    }

    #[test]
    fn test_train_updated_lists_changed_fields_only() {
        let before = Train {
            id: 7,
            route: "A - B".to_string(),
            departure_time: Utc::now(),
            arrival_time: Utc::now(),
            available_seats: 12,
        };
        let patch = TrainPatch {
            route: Some("A - C".to_string()),
            available_seats: Some(10),
            ..Default::default()
        };
        let text = train_updated(&before, &patch);
        assert!(text.starts_with("Train details were updated:\n"));
        assert!(text.contains("A - B -> A - C\n"));
        assert!(text.contains("Available seats: 12 -> 10\n"));
        assert!(!text.contains("Departure time"));
    }

    #[test]
    fn test_resource_event_keeps_key_and_payload() {
        let event = ResourceEvent::new("42", "hello");
        assert_eq!(event.routing_key, "42");
        assert_eq!(event.payload, "hello");
    }
}
