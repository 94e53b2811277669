//! # Tripsplit Sync
//!
//! The sync coordinator: reconciles an optimistically-updated local copy of
//! one trip with the authoritative remote store.
//!
//! ## Overview
//!
//! A [`TripSession`] owns the local state for a single trip and runs the
//! state machine `Unloaded -> Loading -> Ready -> Error` (Error is
//! recoverable by retrying the load).
//!
//! ## Key Properties
//!
//! - **Serialized writes**: one writer lock per session orders local edits
//!   and remote-origin refetches, closing the lost-update race on the
//!   settings blob.
//! - **No ghost entries**: expense writes splice the remote-confirmed row;
//!   failures leave local state untouched.
//! - **Rollback on settings failure**: the optimistic roster edit is undone
//!   when the aggregate fails to persist.
//! - **Explicit invalidation**: a revision counter replaces reactive
//!   recompute; consumers re-derive statistics when it moves.
//! - **Bounded retry**: transient read failures retry with backoff; writes
//!   carry idempotency keys instead of being retried blindly.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tripsplit_store::{MemoryAuth, MemoryCache, MemoryRemote};
//! use tripsplit_sync::TripSession;
//!
//! async fn example(auth: MemoryAuth) {
//!     let session = TripSession::new(MemoryRemote::new(), MemoryCache::new(), auth);
//!     // let trip = session.create_trip("tokyo", None, None).await?;
//!     // session.add_expense(draft).await?;
//!     // let ledger = session.ledger()?;
//! }
//! ```

pub mod error;
pub mod retry;
pub mod session;

pub use error::{Result, SyncError};
pub use retry::{idempotency_key, retry_read, RetryPolicy};
pub use session::{SessionConfig, SessionState, TripSession};
