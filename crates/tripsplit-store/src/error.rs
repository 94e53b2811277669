//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur at the persistence boundaries.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation requires an authenticated identity and none is present.
    #[error("not authenticated")]
    Unauthenticated,

    /// A referenced trip or expense does not exist remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote rejected the write as invalid.
    #[error(transparent)]
    Validation(#[from] tripsplit_core::ValidationError),

    /// The remote call failed (network/server).
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// Snapshot serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
