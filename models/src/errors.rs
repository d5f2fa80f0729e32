// models/src/errors.rs

pub use thiserror::Error;

/// Error taxonomy shared by every layer of the portal.
///
/// Request-rejecting variants carry the full user-facing message;
/// infrastructure variants prefix theirs with the failing subsystem.
#[derive(Debug, Error, PartialEq)]
pub enum PortalError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to acquire lock: {0}")]
    Lock(String),
}

/// A type alias for a `Result` that returns a `PortalError` on failure.
pub type PortalResult<T> = Result<T, PortalError>;
