//! # Tripsplit Store
//!
//! Persistence boundaries for Tripsplit. The authoritative remote store and
//! the auth session are specified as traits; the local snapshot cache has
//! SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`RemoteStore`] - the async trait for the authoritative backend
//! - [`AuthProvider`] - the session boundary
//! - [`Subscription`] / [`ChangeEvent`] - the per-trip change feed
//! - [`SnapshotCache`] - trip-scoped local snapshots
//! - [`SqliteCache`] / [`MemoryCache`] - cache implementations
//! - [`MemoryRemote`] / [`MemoryAuth`] - in-memory backends for tests
//!
//! ## Design Notes
//!
//! - **Server-assigned ids**: inserts return the confirmed row; clients
//!   never invent remote ids.
//! - **Idempotency keys**: retried expense inserts cannot create duplicates.
//! - **Coarse change events**: a notification means "something changed";
//!   consumers re-fetch rather than merge.

pub mod cache;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use cache::{decode_snapshot, encode_snapshot, MemoryCache, SnapshotCache, TripSnapshot};
pub use error::{Result, StoreError};
pub use memory::{MemoryAuth, MemoryRemote};
pub use sqlite::SqliteCache;
pub use traits::{AuthProvider, ChangeAction, ChangeEvent, RemoteStore, Subscription};
