//! Error Types for the Switchyard API
//!
//! This module defines error handling for the service layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use switchyard_core::{StorageError, SwitchyardError, TopologyError, ValidationError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Field value is out of valid range
    InvalidRange,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested entity does not exist
    EntityNotFound,

    /// Requested train does not exist
    TrainNotFound,

    /// Requested booking does not exist
    BookingNotFound,

    /// Requested lobby does not exist
    LobbyNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Entity with the same identifier already exists
    EntityAlreadyExists,

    /// Operation conflicts with current state
    StateConflict,

    // ========================================================================
    // Timeouts (408)
    // ========================================================================
    /// Request did not complete within the configured deadline
    RequestTimeout,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// No primary has been observed for the cluster
    TopologyUnknown,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidRange => StatusCode::BAD_REQUEST,

            ErrorCode::EntityNotFound
            | ErrorCode::TrainNotFound
            | ErrorCode::BookingNotFound
            | ErrorCode::LobbyNotFound => StatusCode::NOT_FOUND,

            ErrorCode::EntityAlreadyExists | ErrorCode::StateConflict => StatusCode::CONFLICT,

            ErrorCode::RequestTimeout => StatusCode::REQUEST_TIMEOUT,

            ErrorCode::ServiceUnavailable | ErrorCode::TopologyUnknown => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidRange => "Value is out of valid range",

            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::TrainNotFound => "Train not found",
            ErrorCode::BookingNotFound => "Booking not found",
            ErrorCode::LobbyNotFound => "Lobby not found",

            ErrorCode::EntityAlreadyExists => "Entity already exists",
            ErrorCode::StateConflict => "Operation conflicts with current state",

            ErrorCode::RequestTimeout => "Request Timeout",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::TopologyUnknown => "Database topology is not known yet",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn invalid_range(field: &str, min: impl fmt::Display, max: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Field '{}' must be between {} and {}", field, min, max),
        )
    }

    /// Create an EntityNotFound error.
    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} with id {} not found", entity_type, id),
        )
    }

    /// Create a generic not found error with custom message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EntityNotFound, message)
    }

    pub fn train_not_found(train_id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TrainNotFound, format!("Train {} not found", train_id))
    }

    pub fn booking_not_found(booking_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::BookingNotFound,
            format!("Booking {} not found", booking_id),
        )
    }

    pub fn lobby_not_found(lobby_id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::LobbyNotFound, format!("Lobby {} not found", lobby_id))
    }

    pub fn entity_already_exists(entity_type: &str, detail: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityAlreadyExists,
            format!("{} already exists: {}", entity_type, detail),
        )
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateConflict, message)
    }

    pub fn request_timeout() -> Self {
        Self::from_code(ErrorCode::RequestTimeout)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn topology_unknown() -> Self {
        Self::from_code(ErrorCode::TopologyUnknown)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => match entity {
                "train" => ApiError::train_not_found(id),
                "booking" => ApiError::booking_not_found(id),
                "lobby" => ApiError::lobby_not_found(id),
                other => ApiError::entity_not_found(other, id),
            },
            StorageError::Conflict { entity, reason } => {
                ApiError::state_conflict(format!("Conflict on {}: {}", entity, reason))
            }
            StorageError::Unreachable { target, reason } => {
                tracing::warn!(target = %target, reason = %reason, "Database unreachable");
                ApiError::service_unavailable(format!("Database at {} is unreachable", target))
            }
            StorageError::Backend { reason } => {
                // Log the full error, return a generic one
                tracing::error!("Database error: {}", reason);
                ApiError::database_error("Database operation failed")
            }
        }
    }
}

impl From<TopologyError> for ApiError {
    fn from(err: TopologyError) -> Self {
        match err {
            TopologyError::Unknown => ApiError::topology_unknown(),
            TopologyError::InvalidEndpoint { .. }
            | TopologyError::InvalidConnectionString { .. } => {
                ApiError::invalid_input(err.to_string())
            }
            TopologyError::Persistence { reason } => {
                tracing::error!("Topology persistence error: {}", reason);
                ApiError::internal_error("Failed to store topology")
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(&field),
            ValidationError::TooLong { .. } => ApiError::validation_failed(err.to_string()),
            ValidationError::OutOfRange { field, min, max } => {
                ApiError::invalid_range(&field, min, max)
            }
        }
    }
}

impl From<SwitchyardError> for ApiError {
    fn from(err: SwitchyardError) -> Self {
        match err {
            SwitchyardError::Storage(e) => e.into(),
            SwitchyardError::Topology(e) => e.into(),
            SwitchyardError::Validation(e) => e.into(),
            SwitchyardError::Bus(e) => {
                tracing::warn!("Event bus error: {}", e);
                ApiError::service_unavailable("Event bus unavailable")
            }
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::ValidationFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::TrainNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::StateConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::RequestTimeout.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::TopologyUnknown.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::ServiceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_api_error_constructors() {
        let err = ApiError::entity_not_found("Train", 123);
        assert_eq!(err.code, ErrorCode::EntityNotFound);
        assert!(err.message.contains("Train"));
        assert!(err.message.contains("123"));

        let err = ApiError::missing_field("route");
        assert_eq!(err.code, ErrorCode::MissingField);
        assert!(err.message.contains("route"));

        let err = ApiError::request_timeout();
        assert_eq!(err.message, "Request Timeout");
    }

    #[test]
    fn test_storage_error_mapping() {
        let err: ApiError = StorageError::NotFound { entity: "booking", id: 9 }.into();
        assert_eq!(err.code, ErrorCode::BookingNotFound);

        let err: ApiError = StorageError::Conflict {
            entity: "booking",
            reason: "no seats left".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: ApiError = StorageError::Unreachable {
            target: "m:5432".to_string(),
            reason: "connection refused".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = StorageError::Backend { reason: "syntax error".to_string() }.into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("syntax"));
    }

    #[test]
    fn test_topology_and_validation_mapping() {
        let err: ApiError = TopologyError::Unknown.into();
        assert_eq!(err.code, ErrorCode::TopologyUnknown);

        let err: ApiError = TopologyError::InvalidConnectionString {
            value: "mysql://x".to_string(),
            reason: "unsupported scheme".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: ApiError = ValidationError::OutOfRange {
            field: "available_seats".to_string(),
            min: 0,
            max: 400,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidRange);
        assert!(err.message.contains("400"));
    }

    #[test]
    fn test_api_error_with_details() {
        let details = serde_json::json!({ "field": "available_seats" });
        let err = ApiError::validation_failed("Invalid seats").with_details(details.clone());
        assert_eq!(err.details, Some(details));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::topology_unknown();
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("TOPOLOGY_UNKNOWN"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::database_error("Connection failed");
        let display = format!("{}", err);

        assert!(display.contains("DatabaseError"));
        assert!(display.contains("Connection failed"));
    }
}
