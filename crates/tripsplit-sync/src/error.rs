//! Error types for the sync module.

use thiserror::Error;

use tripsplit_core::ValidationError;
use tripsplit_store::StoreError;

/// Errors that can occur while coordinating local and remote state.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The operation requires a signed-in user.
    #[error("not authenticated")]
    Unauthenticated,

    /// No trip has been loaded or created in this session.
    #[error("no active trip")]
    NoActiveTrip,

    /// A referenced trip or expense is absent remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rejected before any remote call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A remote read failed (network/server).
    #[error("load failed: {0}")]
    LoadFailed(String),

    /// A remote write failed (network/server).
    #[error("save failed: {0}")]
    SaveFailed(String),

    /// A remote call exceeded its deadline. Distinct from load/save
    /// failures so callers can choose a different recovery.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl SyncError {
    /// Whether a retried attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::LoadFailed(_) | SyncError::SaveFailed(_) | SyncError::Timeout(_)
        )
    }

    /// Classify a store error on a read path.
    pub fn from_load(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => SyncError::NotFound(what),
            StoreError::Unauthenticated => SyncError::Unauthenticated,
            StoreError::Validation(v) => SyncError::Validation(v),
            other => SyncError::LoadFailed(other.to_string()),
        }
    }

    /// Classify a store error on a write path.
    pub fn from_save(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => SyncError::NotFound(what),
            StoreError::Unauthenticated => SyncError::Unauthenticated,
            StoreError::Validation(v) => SyncError::Validation(v),
            other => SyncError::SaveFailed(other.to_string()),
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
