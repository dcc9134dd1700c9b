//! Error types for switchyard operations

use thiserror::Error;

/// Relational storage errors surfaced by sessions and domain services.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Conflict on {entity}: {reason}")]
    Conflict { entity: &'static str, reason: String },

    #[error("Database unreachable at {target}: {reason}")]
    Unreachable { target: String, reason: String },

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },
}

/// Topology errors raised while accepting or resolving cluster topology.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Cluster topology is unknown: no primary has been observed")]
    Unknown,

    #[error("Invalid endpoint '{value}': {reason}")]
    InvalidEndpoint { value: String, reason: String },

    #[error("Invalid connection string '{value}': {reason}")]
    InvalidConnectionString { value: String, reason: String },

    #[error("Topology persistence failed: {reason}")]
    Persistence { reason: String },
}

/// Request validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Field {field} exceeds {max} characters")]
    TooLong { field: String, max: usize },

    #[error("Field {field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

/// Event bus errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("Event bus unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Publish to '{routing_key}' failed: {reason}")]
    PublishFailed { routing_key: String, reason: String },

    #[error("Bind to '{routing_key}' failed: {reason}")]
    BindFailed { routing_key: String, reason: String },

    #[error("Publish to '{routing_key}' timed out")]
    Timeout { routing_key: String },
}

/// Master error type for all switchyard errors.
#[derive(Debug, Clone, Error)]
pub enum SwitchyardError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

/// Result type alias for switchyard operations.
pub type SwitchyardResult<T> = Result<T, SwitchyardError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity: "Train",
            id: 42,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Train"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_topology_error_display_unknown() {
        let msg = format!("{}", TopologyError::Unknown);
        assert!(msg.contains("unknown"));
    }

    #[test]
    fn test_validation_error_display_out_of_range() {
        let err = ValidationError::OutOfRange {
            field: "available_seats".to_string(),
            min: 0,
            max: 400,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("available_seats"));
        assert!(msg.contains("400"));
    }

    #[test]
    fn test_switchyard_error_from_variants() {
        let storage = SwitchyardError::from(StorageError::Backend {
            reason: "boom".to_string(),
        });
        assert!(matches!(storage, SwitchyardError::Storage(_)));

        let topology = SwitchyardError::from(TopologyError::Unknown);
        assert!(matches!(topology, SwitchyardError::Topology(_)));

        let validation = SwitchyardError::from(ValidationError::RequiredFieldMissing {
            field: "route".to_string(),
        });
        assert!(matches!(validation, SwitchyardError::Validation(_)));

        let bus = SwitchyardError::from(BusError::Timeout {
            routing_key: "7".to_string(),
        });
        assert!(matches!(bus, SwitchyardError::Bus(_)));
    }
}
