//! Remote store and auth traits: the abstract persistence boundary.
//!
//! These traits specify the remote side of the system by its interface only:
//! a hosted row store with a realtime change feed in production, the
//! in-memory implementation in tests. All methods are async; implementations
//! must be thread-safe.

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use tripsplit_core::{
    ExpenseDraft, ExpenseId, ExpenseRecord, Trip, TripDraft, TripId, TripSettings, User,
};

use crate::error::Result;

/// What happened to an expense row. The payload is deliberately not richer:
/// consumers only react with a full re-fetch, trading bandwidth for the
/// absence of merge-conflict logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// A change-feed notification for one trip's expenses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub trip_id: TripId,
    pub action: ChangeAction,
    pub expense_id: Option<ExpenseId>,
}

/// Handle to a trip-scoped change feed.
///
/// Dropping the subscription ends it.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    /// Wrap a channel receiver. Used by feed implementations.
    pub fn from_receiver(receiver: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event. Returns `None` when the feed closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Wait for the next event with a deadline.
    ///
    /// Returns `Ok(None)` when the deadline expires before an event arrives.
    pub async fn recv_timeout(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<ChangeEvent>> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(event) => Ok(event),
            Err(_) => Ok(None),
        }
    }

    /// Drain anything already queued without waiting.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

/// The authoritative remote store.
///
/// # Design Notes
///
/// - **Server-assigned ids**: `insert_trip`/`insert_expense` return the row
///   with remote-assigned id and timestamps; callers splice the confirmed
///   row into local state rather than inventing one.
/// - **Idempotent inserts**: `insert_expense` takes a client-generated
///   idempotency key so a retried insert cannot create a duplicate row.
/// - **Ordering**: `list_expenses` returns date descending, ties in
///   insertion order (`order by date desc`).
/// - **Idempotent deletes**: deleting an id that is already gone is a no-op
///   for backends that cannot tell; backends that can tell report
///   `NotFound`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Trip Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a new trip and return it with server fields filled in.
    async fn insert_trip(&self, draft: TripDraft) -> Result<Trip>;

    /// Fetch a trip row. Fails with `NotFound` if absent.
    async fn get_trip(&self, id: &TripId) -> Result<Trip>;

    /// Replace the whole settings aggregate of a trip.
    async fn update_trip_settings(&self, id: &TripId, settings: &TripSettings) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Expense Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert an expense for a trip. The idempotency key deduplicates
    /// retried inserts: a key seen before returns the original row.
    async fn insert_expense(
        &self,
        trip: &TripId,
        draft: ExpenseDraft,
        idempotency_key: &str,
    ) -> Result<ExpenseRecord>;

    /// Full-replace update of an expense's mutable fields.
    async fn update_expense(
        &self,
        trip: &TripId,
        id: &ExpenseId,
        draft: ExpenseDraft,
    ) -> Result<ExpenseRecord>;

    /// Delete an expense.
    async fn delete_expense(&self, trip: &TripId, id: &ExpenseId) -> Result<()>;

    /// All expenses of a trip, date descending.
    async fn list_expenses(&self, trip: &TripId) -> Result<Vec<ExpenseRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Change Feed
    // ─────────────────────────────────────────────────────────────────────────

    /// Subscribe to expense-table changes for one trip.
    async fn subscribe(&self, trip: &TripId) -> Result<Subscription>;
}

/// The authentication boundary.
pub trait AuthProvider: Send + Sync {
    /// The currently signed-in user, if any.
    fn current_user(&self) -> Option<User>;

    /// A watch over session changes. The value flips to `None` on
    /// sign-out; observers must clear trip-scoped local caches then.
    fn session_changes(&self) -> watch::Receiver<Option<User>>;
}

// Shared backends: a session can own an `Arc` handle while tests (or other
// sessions) keep their own.

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<T> {
    async fn insert_trip(&self, draft: TripDraft) -> Result<Trip> {
        (**self).insert_trip(draft).await
    }

    async fn get_trip(&self, id: &TripId) -> Result<Trip> {
        (**self).get_trip(id).await
    }

    async fn update_trip_settings(&self, id: &TripId, settings: &TripSettings) -> Result<()> {
        (**self).update_trip_settings(id, settings).await
    }

    async fn insert_expense(
        &self,
        trip: &TripId,
        draft: ExpenseDraft,
        idempotency_key: &str,
    ) -> Result<ExpenseRecord> {
        (**self).insert_expense(trip, draft, idempotency_key).await
    }

    async fn update_expense(
        &self,
        trip: &TripId,
        id: &ExpenseId,
        draft: ExpenseDraft,
    ) -> Result<ExpenseRecord> {
        (**self).update_expense(trip, id, draft).await
    }

    async fn delete_expense(&self, trip: &TripId, id: &ExpenseId) -> Result<()> {
        (**self).delete_expense(trip, id).await
    }

    async fn list_expenses(&self, trip: &TripId) -> Result<Vec<ExpenseRecord>> {
        (**self).list_expenses(trip).await
    }

    async fn subscribe(&self, trip: &TripId) -> Result<Subscription> {
        (**self).subscribe(trip).await
    }
}

impl<T: AuthProvider + ?Sized> AuthProvider for std::sync::Arc<T> {
    fn current_user(&self) -> Option<User> {
        (**self).current_user()
    }

    fn session_changes(&self) -> watch::Receiver<Option<User>> {
        (**self).session_changes()
    }
}
