//! Error types for the unified Tripsplit API.

use thiserror::Error;

use tripsplit_core::ValidationError;
use tripsplit_store::StoreError;
use tripsplit_sync::SyncError;

/// Errors surfaced by the client facade.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
