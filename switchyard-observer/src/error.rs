//! Observer error types.

use switchyard_storage::RegistryError;
use thiserror::Error;

/// Why a `pg_autoctl show state` table could not be turned into a topology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("No node reports a primary state")]
    NoPrimary,

    #[error("More than one primary reported: {first} and {second}")]
    MultiplePrimaries { first: String, second: String },

    #[error("Invalid host:port '{value}' on line {line}: {reason}")]
    InvalidEndpoint {
        line: usize,
        value: String,
        reason: String,
    },
}

/// Failure to push a topology to one replica.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("Push to {address} failed: {reason}")]
    Transport { address: String, reason: String },

    #[error("Push to {address} rejected with status {status}")]
    Rejected { address: String, status: u16 },
}

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Failed to run cluster manager command: {reason}")]
    Command { reason: String },

    #[error("Cluster manager command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("Cluster manager command timed out")]
    CommandTimeout,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ObserverResult<T> = Result<T, ObserverError>;
