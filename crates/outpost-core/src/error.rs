//! Error types for the outpost registry.
//!
//! Validation failures (bad id, duplicate, unknown entity) are distinct from
//! storage failures so callers can report the former as usage errors and the
//! latter as I/O problems.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for registry operations.
#[derive(Debug, Error)]
pub enum OutpostError {
    // Validation errors
    #[error("invalid entity id: {id:?}")]
    InvalidId { id: String },

    #[error("entity already exists: {id}")]
    DuplicateEntity { id: String },

    #[error("entity not found: {id}")]
    EntityNotFound { id: String },

    #[error("no active entity")]
    NoActiveEntity,

    #[error("validation error for {field}: {message}")]
    Validation { field: String, message: String },

    /// Nested registry load. Always a programming error, never a runtime
    /// condition to recover from.
    #[error("nested registry load detected")]
    Reentrancy,

    // Persistence errors
    #[error("failed to parse {path:?}: {message}")]
    Parse {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Storage {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Collaborator boundaries
    #[error("no tunnel found for entity: {id}")]
    TunnelNotFound { id: String },
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, OutpostError>;

impl From<std::io::Error> for OutpostError {
    fn from(err: std::io::Error) -> Self {
        OutpostError::Storage {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for OutpostError {
    fn from(err: serde_json::Error) -> Self {
        OutpostError::Parse {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}
