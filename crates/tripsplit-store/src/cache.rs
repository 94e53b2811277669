//! The local snapshot cache: trip-scoped optimistic state between sessions.
//!
//! The cache is not authoritative; it exists so a client can render the last
//! known state before the remote round-trip completes. It must be cleared
//! entirely on sign-out.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tripsplit_core::{Category, Currency, ExpenseRecord, Person, TripId};

use crate::error::{Result, StoreError};

/// Everything a client holds for one trip.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub expenses: Vec<ExpenseRecord>,
    pub people: Vec<Person>,
    pub categories: Vec<Category>,
    pub currencies: Vec<Currency>,
}

/// Trip-scoped snapshot persistence.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Load the cached snapshot for a trip, if one exists.
    async fn load(&self, trip: &TripId) -> Result<Option<TripSnapshot>>;

    /// Persist the snapshot for a trip, replacing any previous one.
    async fn save(&self, trip: &TripId, snapshot: &TripSnapshot) -> Result<()>;

    /// Drop the snapshot for one trip.
    async fn clear(&self, trip: &TripId) -> Result<()>;

    /// Drop every snapshot. Called on sign-out.
    async fn clear_all(&self) -> Result<()>;
}

/// Encode a snapshot to the compact binary form used by persistent caches.
pub fn encode_snapshot(snapshot: &TripSnapshot) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(snapshot, &mut bytes)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(bytes)
}

/// Decode a snapshot from its binary form.
pub fn decode_snapshot(bytes: &[u8]) -> Result<TripSnapshot> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl<T: SnapshotCache + ?Sized> SnapshotCache for std::sync::Arc<T> {
    async fn load(&self, trip: &TripId) -> Result<Option<TripSnapshot>> {
        (**self).load(trip).await
    }

    async fn save(&self, trip: &TripId, snapshot: &TripSnapshot) -> Result<()> {
        (**self).save(trip, snapshot).await
    }

    async fn clear(&self, trip: &TripId) -> Result<()> {
        (**self).clear(trip).await
    }

    async fn clear_all(&self) -> Result<()> {
        (**self).clear_all().await
    }
}

/// In-memory cache for tests.
pub struct MemoryCache {
    snapshots: RwLock<HashMap<TripId, TripSnapshot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotCache for MemoryCache {
    async fn load(&self, trip: &TripId) -> Result<Option<TripSnapshot>> {
        Ok(self.snapshots.read().unwrap().get(trip).cloned())
    }

    async fn save(&self, trip: &TripId, snapshot: &TripSnapshot) -> Result<()> {
        self.snapshots
            .write()
            .unwrap()
            .insert(trip.clone(), snapshot.clone());
        Ok(())
    }

    async fn clear(&self, trip: &TripId) -> Result<()> {
        self.snapshots.write().unwrap().remove(trip);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.snapshots.write().unwrap().clear();
        Ok(())
    }
}
