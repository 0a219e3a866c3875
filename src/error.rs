//! Error types for CoordKV
//!
//! Provides a unified error type for all operations. Request-level errors
//! (`NotFound`, `FailedPrecondition`, ...) are not unwound to the caller:
//! the engine converts them into a [`Response`](crate::protocol::Response)
//! carrying the matching [`Status`].

use thiserror::Error;

use crate::protocol::Status;

/// Result type alias using CoordError
pub type Result<T> = std::result::Result<T, CoordError>;

/// Unified error type for CoordKV operations
#[derive(Debug, Error)]
pub enum CoordError {
    // -------------------------------------------------------------------------
    // Request Errors (surfaced through the response channel)
    // -------------------------------------------------------------------------
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    FailedPrecondition(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoordError {
    /// Status code reported to callers for this error
    pub fn status(&self) -> Status {
        match self {
            CoordError::NotFound(_) => Status::NotFound,
            CoordError::FailedPrecondition(_) => Status::FailedPrecondition,
            CoordError::Cancelled => Status::Cancelled,
            CoordError::InvalidArgument(_) | CoordError::Protocol(_) => Status::InvalidArgument,
            CoordError::Io(_) | CoordError::Network(_) | CoordError::Config(_) => Status::Internal,
        }
    }
}
