//! In-memory implementations of the remote store and auth boundaries.
//!
//! These are primarily for testing. The remote has the same observable
//! semantics as the hosted backend: server-assigned ids, date-descending
//! expense lists, settings stored as one blob, and a per-trip change feed.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use tripsplit_core::{
    sort_date_desc, ExpenseDraft, ExpenseId, ExpenseRecord, Trip, TripDraft, TripId,
    TripSettings, User,
};

use crate::error::{Result, StoreError};
use crate::traits::{AuthProvider, ChangeAction, ChangeEvent, RemoteStore, Subscription};

/// In-memory remote store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
/// Supports fault injection so tests can exercise retry and optimistic
/// failure paths.
pub struct MemoryRemote {
    inner: RwLock<MemoryRemoteInner>,
}

struct MemoryRemoteInner {
    /// Trip rows by id.
    trips: HashMap<TripId, Trip>,

    /// Expense rows per trip, in insertion order.
    expenses: HashMap<TripId, Vec<ExpenseRecord>>,

    /// Idempotency keys already honored: (trip, key) -> assigned id.
    idempotency: HashMap<(TripId, String), ExpenseId>,

    /// Change-feed subscribers per trip.
    subscribers: HashMap<TripId, Vec<mpsc::UnboundedSender<ChangeEvent>>>,

    /// Fault injection: the next N operations fail with `Unavailable`.
    fail_next: usize,

    next_trip: u64,
    next_expense: u64,
}

impl MemoryRemote {
    /// Create a new empty in-memory remote.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryRemoteInner {
                trips: HashMap::new(),
                expenses: HashMap::new(),
                idempotency: HashMap::new(),
                subscribers: HashMap::new(),
                fail_next: 0,
                next_trip: 0,
                next_expense: 0,
            }),
        }
    }

    /// Make the next `count` operations fail with `Unavailable`.
    pub fn inject_failures(&self, count: usize) {
        self.inner.write().unwrap().fail_next = count;
    }

    /// Count of expense rows for a trip, unordered.
    pub fn expense_count(&self, trip: &TripId) -> usize {
        let inner = self.inner.read().unwrap();
        inner.expenses.get(trip).map(Vec::len).unwrap_or(0)
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteInner {
    fn check_failure(&mut self) -> Result<()> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    fn notify(&mut self, event: ChangeEvent) {
        if let Some(senders) = self.subscribers.get_mut(&event.trip_id) {
            senders.retain(|sender| sender.send(event.clone()).is_ok());
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn insert_trip(&self, draft: TripDraft) -> Result<Trip> {
        let mut inner = self.inner.write().unwrap();
        inner.check_failure()?;
        draft.settings.validate()?;

        inner.next_trip += 1;
        let now = now_millis();
        let trip = Trip {
            id: TripId::new(format!("trip-{}", inner.next_trip)),
            name: draft.name,
            description: draft.description,
            members: draft.members,
            settings: draft.settings,
            created_by: draft.created_by,
            created_at: now,
            updated_at: now,
        };
        inner.trips.insert(trip.id.clone(), trip.clone());
        inner.expenses.insert(trip.id.clone(), Vec::new());
        debug!(trip = %trip.id, "trip created");
        Ok(trip)
    }

    async fn get_trip(&self, id: &TripId) -> Result<Trip> {
        let mut inner = self.inner.write().unwrap();
        inner.check_failure()?;
        inner
            .trips
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update_trip_settings(&self, id: &TripId, settings: &TripSettings) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.check_failure()?;
        settings.validate()?;

        let trip = inner
            .trips
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        trip.settings = settings.clone();
        trip.updated_at = now_millis();
        Ok(())
    }

    async fn insert_expense(
        &self,
        trip: &TripId,
        draft: ExpenseDraft,
        idempotency_key: &str,
    ) -> Result<ExpenseRecord> {
        let mut inner = self.inner.write().unwrap();
        inner.check_failure()?;

        if !inner.trips.contains_key(trip) {
            return Err(StoreError::NotFound(trip.to_string()));
        }

        // A key we've already honored returns the original row instead of
        // creating a duplicate.
        let key = (trip.clone(), idempotency_key.to_string());
        if let Some(existing_id) = inner.idempotency.get(&key).cloned() {
            if let Some(existing) = inner
                .expenses
                .get(trip)
                .and_then(|rows| rows.iter().find(|e| e.id == existing_id))
            {
                return Ok(existing.clone());
            }
        }

        draft.validate()?;
        inner.next_expense += 1;
        let id = ExpenseId::new(format!("exp-{}", inner.next_expense));
        let record = draft.into_record(id.clone())?;

        inner
            .expenses
            .entry(trip.clone())
            .or_default()
            .push(record.clone());
        inner.idempotency.insert(key, id.clone());
        inner.notify(ChangeEvent {
            trip_id: trip.clone(),
            action: ChangeAction::Insert,
            expense_id: Some(id),
        });
        Ok(record)
    }

    async fn update_expense(
        &self,
        trip: &TripId,
        id: &ExpenseId,
        draft: ExpenseDraft,
    ) -> Result<ExpenseRecord> {
        let mut inner = self.inner.write().unwrap();
        inner.check_failure()?;

        let rows = inner
            .expenses
            .get_mut(trip)
            .ok_or_else(|| StoreError::NotFound(trip.to_string()))?;
        let slot = rows
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let updated = slot.apply(draft)?;
        *slot = updated.clone();

        inner.notify(ChangeEvent {
            trip_id: trip.clone(),
            action: ChangeAction::Update,
            expense_id: Some(id.clone()),
        });
        Ok(updated)
    }

    async fn delete_expense(&self, trip: &TripId, id: &ExpenseId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.check_failure()?;

        let Some(rows) = inner.expenses.get_mut(trip) else {
            return Ok(());
        };
        let before = rows.len();
        rows.retain(|e| &e.id != id);

        // Deleting an id that is already gone is a no-op.
        if rows.len() < before {
            inner.notify(ChangeEvent {
                trip_id: trip.clone(),
                action: ChangeAction::Delete,
                expense_id: Some(id.clone()),
            });
        }
        Ok(())
    }

    async fn list_expenses(&self, trip: &TripId) -> Result<Vec<ExpenseRecord>> {
        let mut inner = self.inner.write().unwrap();
        inner.check_failure()?;

        let mut rows = inner.expenses.get(trip).cloned().unwrap_or_default();
        // Stable sort: same-date rows keep insertion order.
        sort_date_desc(&mut rows);
        Ok(rows)
    }

    async fn subscribe(&self, trip: &TripId) -> Result<Subscription> {
        let mut inner = self.inner.write().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.entry(trip.clone()).or_default().push(tx);
        Ok(Subscription::from_receiver(rx))
    }
}

/// In-memory auth provider backed by a watch channel.
pub struct MemoryAuth {
    session: watch::Sender<Option<User>>,
}

impl MemoryAuth {
    /// Start signed out.
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self { session }
    }

    /// Start with a signed-in user.
    pub fn signed_in(user: User) -> Self {
        let (session, _) = watch::channel(Some(user));
        Self { session }
    }

    pub fn sign_in(&self, user: User) {
        let _ = self.session.send(Some(user));
    }

    pub fn sign_out(&self) {
        let _ = self.session.send(None);
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for MemoryAuth {
    fn current_user(&self) -> Option<User> {
        self.session.borrow().clone()
    }

    fn session_changes(&self) -> watch::Receiver<Option<User>> {
        self.session.subscribe()
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
