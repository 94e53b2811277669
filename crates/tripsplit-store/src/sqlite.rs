//! SQLite implementation of the snapshot cache.
//!
//! Durable local storage for offline starts: one CBOR-encoded snapshot
//! blob per trip, keyed by trip id.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use tripsplit_core::TripId;

use crate::cache::{decode_snapshot, encode_snapshot, SnapshotCache, TripSnapshot};
use crate::error::{Result, StoreError};
use crate::migration;

/// SQLite-based snapshot cache.
///
/// Thread-safe via internal Mutex.
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Open a cache database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory cache database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                Some(format!("mutex poisoned: {}", e)),
            ))
        })?;
        f(&conn)
    }
}

#[async_trait]
impl SnapshotCache for SqliteCache {
    async fn load(&self, trip: &TripId) -> Result<Option<TripSnapshot>> {
        let bytes: Option<Vec<u8>> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT snapshot FROM snapshots WHERE trip_id = ?1",
                params![trip.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })?;

        match bytes {
            Some(bytes) => Ok(Some(decode_snapshot(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, trip: &TripId, snapshot: &TripSnapshot) -> Result<()> {
        let bytes = encode_snapshot(snapshot)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO snapshots (trip_id, snapshot, saved_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(trip_id) DO UPDATE SET snapshot = ?2, saved_at = ?3",
                params![trip.as_str(), bytes, now_millis()],
            )?;
            Ok(())
        })?;
        debug!(trip = %trip, "snapshot saved");
        Ok(())
    }

    async fn clear(&self, trip: &TripId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM snapshots WHERE trip_id = ?1",
                params![trip.as_str()],
            )?;
            Ok(())
        })
    }

    async fn clear_all(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM snapshots", [])?;
            Ok(())
        })
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
