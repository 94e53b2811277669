//! The per-trip sync session.
//!
//! A [`TripSession`] reconciles optimistically-updated local state with the
//! authoritative remote store. All mutations - local-origin edits and
//! remote-origin change notifications alike - funnel through one writer
//! lock per session, so a read-modify-write of the settings aggregate can
//! never be based on a snapshot another write has already invalidated.
//!
//! ## Write discipline
//!
//! - Expense mutations are remote-confirm-then-splice: the confirmed row
//!   (remote-assigned id, server-computed fields) is spliced into the local
//!   list only after the remote accepts the write. A failed write leaves
//!   local state untouched, so no ghost entries.
//! - Settings mutations apply locally first, persist the whole aggregate,
//!   and roll the local copy back if the remote rejects it.
//! - Every local mutation bumps a monotonically increasing revision
//!   counter; callers recompute statistics when it moves.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use tripsplit_core::{
    category_totals, compute_ledger, sort_date_desc, Category, CategoryId, CategoryTotal,
    Currency, CurrencyId, CurrencyTable, ExpenseDraft, ExpenseId, ExpenseRecord, Ledger, Person,
    PersonId, Trip, TripDraft, TripId, TripSettings, UnknownPersonPolicy,
};
use tripsplit_store::{
    AuthProvider, RemoteStore, SnapshotCache, StoreError, Subscription, TripSnapshot,
};

use crate::error::{Result, SyncError};
use crate::retry::{idempotency_key, retry_read, RetryPolicy};

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for every remote call.
    pub remote_timeout: Duration,
    /// Retry budget for idempotent reads.
    pub retry: RetryPolicy,
    /// How the ledger treats person ids missing from the roster.
    pub unknown_person: UnknownPersonPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            unknown_person: UnknownPersonPolicy::AutoVivify,
        }
    }
}

/// Lifecycle of a session's trip data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded yet.
    Unloaded,
    /// A load or create is in flight.
    Loading,
    /// Local state mirrors a known-good remote snapshot.
    Ready,
    /// The last load failed. Recoverable: retry `load_trip`.
    Error,
}

#[derive(Default)]
struct LocalState {
    /// The active trip id; set by load/create or a cache restore.
    trip_id: Option<TripId>,
    /// The full trip row, once fetched from the remote.
    trip: Option<Trip>,
    /// Local copy of the settings aggregate.
    settings: TripSettings,
    /// Local copy of the expense list, kept in date-descending order.
    expenses: Vec<ExpenseRecord>,
}

/// Sync coordinator for one trip at a time.
pub struct TripSession<R, C, A> {
    remote: R,
    cache: C,
    auth: A,
    config: SessionConfig,
    /// Serializes every mutation: local edits and remote-origin refetches.
    writer: AsyncMutex<()>,
    local: RwLock<LocalState>,
    state: RwLock<SessionState>,
    /// Last remote failure, for UI observation.
    last_error: RwLock<Option<String>>,
    revision: AtomicU64,
    subscription: AsyncMutex<Option<Subscription>>,
}

impl<R, C, A> TripSession<R, C, A>
where
    R: RemoteStore,
    C: SnapshotCache,
    A: AuthProvider,
{
    /// Create a session with default configuration.
    pub fn new(remote: R, cache: C, auth: A) -> Self {
        Self::with_config(remote, cache, auth, SessionConfig::default())
    }

    pub fn with_config(remote: R, cache: C, auth: A, config: SessionConfig) -> Self {
        Self {
            remote,
            cache,
            auth,
            config,
            writer: AsyncMutex::new(()),
            local: RwLock::new(LocalState::default()),
            state: RwLock::new(SessionState::Unloaded),
            last_error: RwLock::new(None),
            revision: AtomicU64::new(0),
            subscription: AsyncMutex::new(None),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap()
    }

    /// Monotonically increasing counter, bumped by every local mutation.
    /// Consumers recompute derived statistics when it moves.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// The last recorded remote failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().unwrap().clone()
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn auth(&self) -> &A {
        &self.auth
    }

    /// The active trip row, once loaded.
    pub fn trip(&self) -> Option<Trip> {
        self.local.read().unwrap().trip.clone()
    }

    /// Current local expense list, date descending.
    pub fn expenses(&self) -> Vec<ExpenseRecord> {
        self.local.read().unwrap().expenses.clone()
    }

    /// Current local settings aggregate.
    pub fn settings(&self) -> Result<TripSettings> {
        let local = self.local.read().unwrap();
        if local.trip_id.is_none() {
            return Err(SyncError::NoActiveTrip);
        }
        Ok(local.settings.clone())
    }

    pub fn people(&self) -> Vec<Person> {
        self.local.read().unwrap().settings.people.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.local.read().unwrap().settings.categories.clone()
    }

    pub fn currencies(&self) -> Vec<Currency> {
        self.local.read().unwrap().settings.currencies.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived Statistics
    // ─────────────────────────────────────────────────────────────────────────

    /// Per-person settlement ledger over the current local snapshot.
    ///
    /// Pure recompute-on-read; pair with [`TripSession::revision`] to avoid
    /// recomputing when nothing changed.
    pub fn ledger(&self) -> Result<Ledger> {
        let (expenses, people) = {
            let local = self.local.read().unwrap();
            (local.expenses.clone(), local.settings.people.clone())
        };
        Ok(compute_ledger(
            &expenses,
            &people,
            self.config.unknown_person,
        )?)
    }

    /// Per-category totals over the current local snapshot.
    pub fn category_statistics(&self) -> Vec<CategoryTotal> {
        let local = self.local.read().unwrap();
        category_totals(&local.expenses)
    }

    /// Conversion table over the current currency settings.
    pub fn currency_table(&self) -> CurrencyTable {
        let local = self.local.read().unwrap();
        CurrencyTable::from_currencies(&local.settings.currencies)
    }

    /// Fix an entered amount into the trip's base unit (rounded once).
    pub fn to_base(&self, amount: Decimal, currency: &CurrencyId) -> Result<Decimal> {
        Ok(self.currency_table().to_base(amount, currency)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Trip Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a trip and make it the active one.
    ///
    /// Requires a signed-in user. Seeds default currencies and categories
    /// when no settings are supplied.
    pub async fn create_trip(
        &self,
        name: &str,
        description: Option<&str>,
        settings: Option<TripSettings>,
    ) -> Result<Trip> {
        let user = self.auth.current_user().ok_or(SyncError::Unauthenticated)?;
        let settings = settings.unwrap_or_else(TripSettings::seed);
        settings.validate()?;

        let _guard = self.writer.lock().await;
        self.set_state(SessionState::Loading);

        let draft = TripDraft {
            name: name.to_string(),
            description: description.map(String::from),
            members: vec![user.handle().to_string()],
            settings,
            created_by: user.id,
        };
        let trip = match self.remote_write(self.remote.insert_trip(draft)).await {
            Ok(trip) => trip,
            Err(e) => {
                self.set_state(SessionState::Error);
                self.record_error(&e);
                return Err(e);
            }
        };

        {
            let mut local = self.local.write().unwrap();
            local.trip_id = Some(trip.id.clone());
            local.settings = trip.settings.clone();
            local.trip = Some(trip.clone());
            local.expenses.clear();
        }
        self.bump();
        self.clear_error();
        self.set_state(SessionState::Ready);
        info!(trip = %trip.id, "trip created");

        self.open_subscription(&trip.id).await;
        self.persist_cache().await;
        Ok(trip)
    }

    /// Load a trip and its expenses, replacing the active trip.
    ///
    /// Fail-safe: a fetch failure leaves previously loaded local data
    /// untouched (stale-but-consistent beats partially-overwritten) and
    /// parks the session in `Error`.
    pub async fn load_trip(&self, id: &TripId) -> Result<Trip> {
        let _guard = self.writer.lock().await;
        self.set_state(SessionState::Loading);

        let trip = match retry_read(&self.config.retry, "trip row", || {
            self.remote_read(self.remote.get_trip(id))
        })
        .await
        {
            Ok(trip) => trip,
            Err(e) => return Err(self.fail_load(e)),
        };

        let expenses = match retry_read(&self.config.retry, "expense list", || {
            self.remote_read(self.remote.list_expenses(id))
        })
        .await
        {
            Ok(expenses) => expenses,
            Err(e) => return Err(self.fail_load(e)),
        };

        {
            let mut local = self.local.write().unwrap();
            local.trip_id = Some(trip.id.clone());
            local.settings = trip.settings.clone();
            local.trip = Some(trip.clone());
            local.expenses = expenses;
        }
        self.bump();
        self.clear_error();
        self.set_state(SessionState::Ready);
        info!(trip = %trip.id, "trip loaded");

        self.open_subscription(&trip.id).await;
        self.persist_cache().await;
        Ok(trip)
    }

    /// Restore the last cached snapshot for a trip without a remote
    /// round-trip. Returns `false` when nothing is cached.
    ///
    /// The session becomes `Ready` on the cached data; a later
    /// [`TripSession::load_trip`] replaces it with the authoritative state.
    pub async fn restore_cached(&self, id: &TripId) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let snapshot = match self.cache.load(id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(false),
            Err(e) => return Err(SyncError::from_load(e)),
        };

        {
            let mut local = self.local.write().unwrap();
            local.trip_id = Some(id.clone());
            local.trip = None;
            local.settings = TripSettings {
                people: snapshot.people,
                categories: snapshot.categories,
                currencies: snapshot.currencies,
            };
            local.expenses = snapshot.expenses;
        }
        self.bump();
        self.set_state(SessionState::Ready);
        debug!(trip = %id, "restored cached snapshot");
        Ok(true)
    }

    /// Clear all trip-scoped state and cached snapshots. Called when the
    /// session's user signs out.
    pub async fn handle_sign_out(&self) -> Result<()> {
        let _guard = self.writer.lock().await;
        *self.subscription.lock().await = None;
        *self.local.write().unwrap() = LocalState::default();
        self.bump();
        self.set_state(SessionState::Unloaded);
        self.cache.clear_all().await.map_err(SyncError::from_save)?;
        info!("signed out, local trip state cleared");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expense Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an expense: validate, write remotely, splice the confirmed row.
    pub async fn add_expense(&self, draft: ExpenseDraft) -> Result<ExpenseRecord> {
        draft.validate()?;
        let trip_id = self.active_trip_id()?;

        let _guard = self.writer.lock().await;
        let key = idempotency_key();
        let record = self
            .remote_write(self.remote.insert_expense(&trip_id, draft, &key))
            .await
            .map_err(|e| self.fail_op(e))?;

        {
            let mut local = self.local.write().unwrap();
            local.expenses.push(record.clone());
            sort_date_desc(&mut local.expenses);
        }
        self.bump();
        self.clear_error();
        self.persist_cache().await;
        Ok(record)
    }

    /// Replace an expense's mutable fields.
    pub async fn update_expense(
        &self,
        id: &ExpenseId,
        draft: ExpenseDraft,
    ) -> Result<ExpenseRecord> {
        draft.validate()?;
        let trip_id = self.active_trip_id()?;

        let _guard = self.writer.lock().await;
        let record = self
            .remote_write(self.remote.update_expense(&trip_id, id, draft))
            .await
            .map_err(|e| self.fail_op(e))?;

        {
            let mut local = self.local.write().unwrap();
            match local.expenses.iter_mut().find(|e| &e.id == id) {
                Some(slot) => *slot = record.clone(),
                None => local.expenses.push(record.clone()),
            }
            sort_date_desc(&mut local.expenses);
        }
        self.bump();
        self.clear_error();
        self.persist_cache().await;
        Ok(record)
    }

    /// Delete an expense. Surfaces `NotFound` if the remote rejects the id.
    pub async fn delete_expense(&self, id: &ExpenseId) -> Result<()> {
        let trip_id = self.active_trip_id()?;

        let _guard = self.writer.lock().await;
        self.remote_write(self.remote.delete_expense(&trip_id, id))
            .await
            .map_err(|e| self.fail_op(e))?;

        self.local
            .write()
            .unwrap()
            .expenses
            .retain(|e| &e.id != id);
        self.bump();
        self.clear_error();
        self.persist_cache().await;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Settings Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the whole settings aggregate and persist it once.
    pub async fn update_settings(
        &self,
        people: Vec<Person>,
        categories: Vec<Category>,
        currencies: Vec<Currency>,
    ) -> Result<()> {
        let settings = TripSettings {
            people,
            categories,
            currencies,
        };
        let _guard = self.writer.lock().await;
        self.apply_settings_locked(settings).await
    }

    /// Add a person to the roster.
    pub async fn add_person(&self, name: &str) -> Result<Person> {
        let _guard = self.writer.lock().await;
        let mut settings = self.settings()?;
        let person = Person {
            id: PersonId::new(mint_member_id()),
            name: name.to_string(),
        };
        settings.people.push(person.clone());
        self.apply_settings_locked(settings).await?;
        Ok(person)
    }

    /// Remove a person. Expenses referencing them are untouched; the ledger
    /// keeps their entry under the dangling id.
    pub async fn remove_person(&self, id: &PersonId) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut settings = self.settings()?;
        settings.people.retain(|p| &p.id != id);
        self.apply_settings_locked(settings).await
    }

    pub async fn add_category(&self, name: &str, color: &str) -> Result<Category> {
        let _guard = self.writer.lock().await;
        let mut settings = self.settings()?;
        let category = Category {
            id: CategoryId::new(mint_member_id()),
            name: name.to_string(),
            color: color.to_string(),
        };
        settings.categories.push(category.clone());
        self.apply_settings_locked(settings).await?;
        Ok(category)
    }

    /// Remove a category. Expenses keep the dangling reference.
    pub async fn remove_category(&self, id: &CategoryId) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut settings = self.settings()?;
        settings.categories.retain(|c| &c.id != id);
        self.apply_settings_locked(settings).await
    }

    pub async fn add_currency(
        &self,
        name: &str,
        symbol: &str,
        rate: Decimal,
    ) -> Result<Currency> {
        let _guard = self.writer.lock().await;
        let mut settings = self.settings()?;
        let currency = Currency {
            id: CurrencyId::new(mint_member_id()),
            name: name.to_string(),
            symbol: symbol.to_string(),
            rate,
            is_default: false,
        };
        settings.currencies.push(currency.clone());
        self.apply_settings_locked(settings).await?;
        Ok(currency)
    }

    pub async fn remove_currency(&self, id: &CurrencyId) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut settings = self.settings()?;
        settings.currencies.retain(|c| &c.id != id);
        self.apply_settings_locked(settings).await
    }

    pub async fn update_currency_rate(&self, id: &CurrencyId, rate: Decimal) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut settings = self.settings()?;
        match settings.currencies.iter_mut().find(|c| &c.id == id) {
            Some(currency) => currency.rate = rate,
            None => return Err(SyncError::Validation(
                tripsplit_core::ValidationError::UnknownCurrency(id.clone()),
            )),
        }
        self.apply_settings_locked(settings).await
    }

    /// Optimistic apply + persist + rollback-on-failure. Caller must hold
    /// the writer lock.
    async fn apply_settings_locked(&self, settings: TripSettings) -> Result<()> {
        settings.validate()?;
        let trip_id = self.active_trip_id()?;

        let previous = {
            let mut local = self.local.write().unwrap();
            let previous = local.settings.clone();
            local.settings = settings.clone();
            if let Some(trip) = local.trip.as_mut() {
                trip.settings = settings.clone();
            }
            previous
        };
        self.bump();

        match self
            .remote_write(self.remote.update_trip_settings(&trip_id, &settings))
            .await
        {
            Ok(()) => {
                self.clear_error();
                self.persist_cache().await;
                Ok(())
            }
            Err(e) => {
                // Roll the optimistic mutation back so local and remote
                // cannot drift apart silently.
                {
                    let mut local = self.local.write().unwrap();
                    local.settings = previous.clone();
                    if let Some(trip) = local.trip.as_mut() {
                        trip.settings = previous;
                    }
                }
                self.bump();
                self.record_error(&e);
                warn!(trip = %trip_id, error = %e, "settings persist failed, rolled back");
                Err(e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Change Feed
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply any queued remote change notifications.
    ///
    /// A notification only means "something changed": the response is a
    /// full expense re-fetch, applied under the same writer lock as local
    /// mutations. Returns whether a re-fetch happened.
    pub async fn poll_changes(&self) -> Result<bool> {
        let events = {
            let mut subscription = self.subscription.lock().await;
            match subscription.as_mut() {
                Some(sub) => sub.drain(),
                None => return Ok(false),
            }
        };
        if events.is_empty() {
            return Ok(false);
        }

        debug!(count = events.len(), "remote change notifications");
        let _guard = self.writer.lock().await;
        self.refetch_expenses_locked().await?;
        Ok(true)
    }

    /// Block up to `timeout` for a change notification, then re-fetch.
    /// Returns whether a re-fetch happened.
    pub async fn wait_change(&self, timeout: Duration) -> Result<bool> {
        let received = {
            let mut subscription = self.subscription.lock().await;
            match subscription.as_mut() {
                Some(sub) => sub.recv_timeout(timeout).await.map_err(SyncError::from_load)?,
                None => return Ok(false),
            }
        };
        if received.is_none() {
            return Ok(false);
        }

        // Coalesce whatever else queued up behind the first event.
        {
            let mut subscription = self.subscription.lock().await;
            if let Some(sub) = subscription.as_mut() {
                let _ = sub.drain();
            }
        }

        let _guard = self.writer.lock().await;
        self.refetch_expenses_locked().await?;
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn active_trip_id(&self) -> Result<TripId> {
        self.local
            .read()
            .unwrap()
            .trip_id
            .clone()
            .ok_or(SyncError::NoActiveTrip)
    }

    fn bump(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write().unwrap() = state;
    }

    fn record_error(&self, e: &SyncError) {
        *self.last_error.write().unwrap() = Some(e.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write().unwrap() = None;
    }

    /// Record a load failure and park the session in `Error` without
    /// touching local data.
    fn fail_load(&self, e: SyncError) -> SyncError {
        self.set_state(SessionState::Error);
        self.record_error(&e);
        warn!(error = %e, "load failed");
        e
    }

    /// Record a write failure. The session stays `Ready`: local data is
    /// still the last known-good snapshot.
    fn fail_op(&self, e: SyncError) -> SyncError {
        self.record_error(&e);
        warn!(error = %e, "write failed");
        e
    }

    async fn remote_read<T>(
        &self,
        fut: impl Future<Output = tripsplit_store::Result<T>>,
    ) -> Result<T> {
        self.with_deadline(fut).await?.map_err(SyncError::from_load)
    }

    async fn remote_write<T>(
        &self,
        fut: impl Future<Output = tripsplit_store::Result<T>>,
    ) -> Result<T> {
        self.with_deadline(fut).await?.map_err(SyncError::from_save)
    }

    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = tripsplit_store::Result<T>>,
    ) -> Result<std::result::Result<T, StoreError>> {
        let deadline = self.config.remote_timeout;
        tokio::time::timeout(deadline, fut)
            .await
            .map_err(|_| SyncError::Timeout(deadline))
    }

    async fn open_subscription(&self, trip: &TripId) {
        match self.remote.subscribe(trip).await {
            Ok(sub) => *self.subscription.lock().await = Some(sub),
            // Not fatal: the session still works, it just won't see other
            // participants' edits until the next load.
            Err(e) => warn!(trip = %trip, error = %e, "change subscription failed"),
        }
    }

    /// Replace the local expense list with the remote's. Caller must hold
    /// the writer lock.
    async fn refetch_expenses_locked(&self) -> Result<()> {
        let trip_id = self.active_trip_id()?;
        let expenses = retry_read(&self.config.retry, "expense refetch", || {
            self.remote_read(self.remote.list_expenses(&trip_id))
        })
        .await
        .map_err(|e| self.fail_op(e))?;

        self.local.write().unwrap().expenses = expenses;
        self.bump();
        self.persist_cache().await;
        Ok(())
    }

    /// Best-effort snapshot persistence; a cache failure never fails the
    /// mutation that triggered it.
    async fn persist_cache(&self) {
        let (trip_id, snapshot) = {
            let local = self.local.read().unwrap();
            let Some(trip_id) = local.trip_id.clone() else {
                return;
            };
            (
                trip_id,
                TripSnapshot {
                    expenses: local.expenses.clone(),
                    people: local.settings.people.clone(),
                    categories: local.settings.categories.clone(),
                    currencies: local.settings.currencies.clone(),
                },
            )
        };
        if let Err(e) = self.cache.save(&trip_id, &snapshot).await {
            warn!(trip = %trip_id, error = %e, "snapshot save failed");
        }
    }
}

/// Mint an opaque id for a settings member (person/category/currency).
fn mint_member_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tripsplit_core::{User, UserId};
    use tripsplit_store::{MemoryAuth, MemoryCache, MemoryRemote};

    type MemorySession = TripSession<MemoryRemote, MemoryCache, MemoryAuth>;

    fn signed_in_session() -> MemorySession {
        let auth = MemoryAuth::signed_in(User {
            id: UserId::new("u-1"),
            email: Some("u1@example.com".into()),
        });
        let config = SessionConfig {
            remote_timeout: Duration::from_millis(250),
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
            },
            unknown_person: UnknownPersonPolicy::AutoVivify,
        };
        TripSession::with_config(MemoryRemote::new(), MemoryCache::new(), auth, config)
    }

    fn draft(date: &str, amount: Decimal, payer: &str, participants: &[&str]) -> ExpenseDraft {
        ExpenseDraft {
            date: date.into(),
            item_name: "item".into(),
            category: CategoryId::new("1"),
            amount,
            original_amount: None,
            currency: CurrencyId::new("1"),
            participants: participants.iter().map(|p| PersonId::new(*p)).collect(),
            payer: PersonId::new(payer),
            note: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_trip_requires_auth() {
        let session = TripSession::new(MemoryRemote::new(), MemoryCache::new(), MemoryAuth::new());
        let err = session.create_trip("trip", None, None).await.unwrap_err();
        assert!(matches!(err, SyncError::Unauthenticated));
        assert_eq!(session.state(), SessionState::Unloaded);
    }

    #[tokio::test]
    async fn test_create_trip_seeds_defaults_and_becomes_ready() {
        let session = signed_in_session();
        let trip = session.create_trip("tokyo", Some("spring"), None).await.unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(trip.members, vec!["u1@example.com".to_string()]);
        assert_eq!(session.currencies().len(), 5);
        assert_eq!(session.categories().len(), 6);
        assert!(session.revision() > 0);
    }

    #[tokio::test]
    async fn test_mutation_before_load_is_rejected() {
        let session = signed_in_session();
        let err = session
            .add_expense(draft("2025-07-01", dec!(10), "a", &["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NoActiveTrip));
    }

    #[tokio::test]
    async fn test_load_trip_populates_local_state() {
        let session = signed_in_session();
        let trip = session.create_trip("trip", None, None).await.unwrap();
        session
            .add_expense(draft("2025-07-01", dec!(100), "a", &["a", "b"]))
            .await
            .unwrap();

        // A fresh session against the same remote sees everything.
        let other = TripSession::new(
            MemoryRemote::new(),
            MemoryCache::new(),
            MemoryAuth::signed_in(User {
                id: UserId::new("u-2"),
                email: None,
            }),
        );
        // (different remote: nothing to find)
        assert!(matches!(
            other.load_trip(&trip.id).await.unwrap_err(),
            SyncError::NotFound(_)
        ));

        let reloaded = session.load_trip(&trip.id).await.unwrap();
        assert_eq!(reloaded.id, trip.id);
        assert_eq!(session.expenses().len(), 1);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_data() {
        let session = signed_in_session();
        let trip = session.create_trip("trip", None, None).await.unwrap();
        session
            .add_expense(draft("2025-07-01", dec!(50), "a", &["a"]))
            .await
            .unwrap();

        // Exhaust the 2-attempt read budget.
        session.remote().inject_failures(2);
        let err = session.load_trip(&trip.id).await.unwrap_err();
        assert!(matches!(err, SyncError::LoadFailed(_)));
        assert_eq!(session.state(), SessionState::Error);
        // Stale-but-consistent: the earlier snapshot is untouched.
        assert_eq!(session.expenses().len(), 1);
        assert!(session.last_error().is_some());

        // Error is recoverable.
        let reloaded = session.load_trip(&trip.id).await;
        assert!(reloaded.is_ok());
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_transient_load_failure_recovers_within_budget() {
        let session = signed_in_session();
        let trip = session.create_trip("trip", None, None).await.unwrap();

        // One failure, two attempts allowed: the retry absorbs it.
        session.remote().inject_failures(1);
        assert!(session.load_trip(&trip.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_add_leaves_local_untouched() {
        let session = signed_in_session();
        session.create_trip("trip", None, None).await.unwrap();
        let before = session.revision();

        session.remote().inject_failures(1);
        let err = session
            .add_expense(draft("2025-07-01", dec!(10), "a", &["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SaveFailed(_)));
        assert!(session.expenses().is_empty());
        assert_eq!(session.revision(), before);
        assert!(session.last_error().is_some());
        assert_eq!(session.state(), SessionState::Ready);

        // Writes are not blindly retried: the remote saw exactly one call.
        let trip_id = session.trip().unwrap().id;
        assert_eq!(session.remote().expense_count(&trip_id), 0);
    }

    #[tokio::test]
    async fn test_add_update_delete_splice_confirmed_rows() {
        let session = signed_in_session();
        session.create_trip("trip", None, None).await.unwrap();

        let added = session
            .add_expense(draft("2025-07-01", dec!(90), "a", &["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(added.average_amount, dec!(30));
        assert_eq!(session.expenses().len(), 1);

        let updated = session
            .update_expense(&added.id, draft("2025-07-02", dec!(60), "a", &["a", "b"]))
            .await
            .unwrap();
        assert_eq!(updated.id, added.id);
        assert_eq!(updated.average_amount, dec!(30));
        assert_eq!(session.expenses()[0].date, "2025-07-02");

        session.delete_expense(&added.id).await.unwrap();
        assert!(session.expenses().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_expense_is_not_found() {
        let session = signed_in_session();
        session.create_trip("trip", None, None).await.unwrap();
        let err = session
            .update_expense(&ExpenseId::new("missing"), draft("2025-07-01", dec!(1), "a", &["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_draft_fails_before_remote() {
        let session = signed_in_session();
        session.create_trip("trip", None, None).await.unwrap();
        let trip_id = session.trip().unwrap().id;

        let err = session
            .add_expense(draft("2025-07-01", dec!(10), "a", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        // Fail fast: the remote never saw the write.
        assert_eq!(session.remote().expense_count(&trip_id), 0);
    }

    #[tokio::test]
    async fn test_settings_rollback_on_remote_failure() {
        let session = signed_in_session();
        session.create_trip("trip", None, None).await.unwrap();
        let people_before = session.people();

        session.remote().inject_failures(1);
        let err = session.add_person("dana").await.unwrap_err();
        assert!(matches!(err, SyncError::SaveFailed(_)));
        assert_eq!(session.people(), people_before);
        assert!(session.last_error().is_some());
    }

    #[tokio::test]
    async fn test_granular_settings_edits_compose() {
        let session = signed_in_session();
        session.create_trip("trip", None, None).await.unwrap();

        let alice = session.add_person("alice").await.unwrap();
        let bob = session.add_person("bob").await.unwrap();
        assert_eq!(session.people().len(), 2);
        assert_ne!(alice.id, bob.id);

        session.remove_person(&alice.id).await.unwrap();
        assert_eq!(session.people(), vec![bob.clone()]);

        let cat = session.add_category("drinks", "#ffffff").await.unwrap();
        session.remove_category(&cat.id).await.unwrap();

        let gbp = session.add_currency("Pound", "GBP", dec!(40.1)).await.unwrap();
        session.update_currency_rate(&gbp.id, dec!(39.9)).await.unwrap();
        let rate = session
            .currencies()
            .into_iter()
            .find(|c| c.id == gbp.id)
            .unwrap()
            .rate;
        assert_eq!(rate, dec!(39.9));

        // The aggregate persisted remotely after each edit.
        let remote_trip = session.remote().get_trip(&session.trip().unwrap().id).await.unwrap();
        assert_eq!(remote_trip.settings, session.settings().unwrap());
    }

    #[tokio::test]
    async fn test_settings_validation_rejected_before_remote() {
        let session = signed_in_session();
        session.create_trip("trip", None, None).await.unwrap();
        let before = session.settings().unwrap();

        let mut currencies = before.currencies.clone();
        currencies[1].is_default = true; // second default, rate != 1
        let err = session
            .update_settings(before.people.clone(), before.categories.clone(), currencies)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(session.settings().unwrap(), before);
    }

    #[tokio::test]
    async fn test_poll_changes_refetches_after_foreign_write() {
        let session = signed_in_session();
        let trip = session.create_trip("trip", None, None).await.unwrap();

        // Another participant writes directly against the remote.
        session
            .remote()
            .insert_expense(&trip.id, draft("2025-07-03", dec!(77), "b", &["b"]), "other-key")
            .await
            .unwrap();
        assert!(session.expenses().is_empty());

        let refreshed = session.poll_changes().await.unwrap();
        assert!(refreshed);
        assert_eq!(session.expenses().len(), 1);
        assert_eq!(session.expenses()[0].amount, dec!(77));

        // No new events: nothing to do.
        assert!(!session.poll_changes().await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_change_coalesces_bursts() {
        let session = signed_in_session();
        let trip = session.create_trip("trip", None, None).await.unwrap();

        for i in 0..3 {
            session
                .remote()
                .insert_expense(
                    &trip.id,
                    draft("2025-07-03", dec!(10), "b", &["b"]),
                    &format!("k-{i}"),
                )
                .await
                .unwrap();
        }

        let refreshed = session.wait_change(Duration::from_millis(100)).await.unwrap();
        assert!(refreshed);
        assert_eq!(session.expenses().len(), 3);

        // The burst was coalesced into one refetch; the queue is drained.
        assert!(!session.wait_change(Duration::from_millis(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_revision_strictly_increases() {
        let session = signed_in_session();
        session.create_trip("trip", None, None).await.unwrap();

        let mut seen = vec![session.revision()];
        session
            .add_expense(draft("2025-07-01", dec!(10), "a", &["a"]))
            .await
            .unwrap();
        seen.push(session.revision());
        session.add_person("p").await.unwrap();
        seen.push(session.revision());

        let mut sorted = seen.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(seen, sorted, "revision must strictly increase: {seen:?}");
    }

    #[tokio::test]
    async fn test_restore_cached_snapshot() {
        let session = signed_in_session();
        let trip = session.create_trip("trip", None, None).await.unwrap();
        session
            .add_expense(draft("2025-07-01", dec!(25), "a", &["a"]))
            .await
            .unwrap();

        // A new session sharing the cache starts from the snapshot without
        // touching the remote.
        let auth = MemoryAuth::signed_in(User {
            id: UserId::new("u-1"),
            email: None,
        });
        let restored_session = TripSession::new(MemoryRemote::new(), MemoryCache::new(), auth);
        assert!(!restored_session.restore_cached(&trip.id).await.unwrap());

        // Same cache contents: copy the snapshot over.
        let snapshot = session.cache().load(&trip.id).await.unwrap().unwrap();
        restored_session
            .cache()
            .save(&trip.id, &snapshot)
            .await
            .unwrap();
        assert!(restored_session.restore_cached(&trip.id).await.unwrap());
        assert_eq!(restored_session.state(), SessionState::Ready);
        assert_eq!(restored_session.expenses().len(), 1);
        assert_eq!(restored_session.currencies().len(), 5);
    }

    #[tokio::test]
    async fn test_sign_out_clears_local_and_cache() {
        let session = signed_in_session();
        let trip = session.create_trip("trip", None, None).await.unwrap();
        session
            .add_expense(draft("2025-07-01", dec!(25), "a", &["a"]))
            .await
            .unwrap();
        assert!(session.cache().load(&trip.id).await.unwrap().is_some());

        session.auth().sign_out();
        session.handle_sign_out().await.unwrap();

        assert_eq!(session.state(), SessionState::Unloaded);
        assert!(session.expenses().is_empty());
        assert!(session.cache().load(&trip.id).await.unwrap().is_none());
        assert!(matches!(session.settings(), Err(SyncError::NoActiveTrip)));
    }

    #[tokio::test]
    async fn test_ledger_reflects_local_snapshot() {
        let session = signed_in_session();
        session.create_trip("trip", None, None).await.unwrap();
        let a = session.add_person("a").await.unwrap();
        let b = session.add_person("b").await.unwrap();
        let c = session.add_person("c").await.unwrap();

        session
            .add_expense(draft(
                "2025-07-01",
                dec!(300),
                a.id.as_str(),
                &[a.id.as_str(), b.id.as_str(), c.id.as_str()],
            ))
            .await
            .unwrap();

        let ledger = session.ledger().unwrap();
        assert_eq!(ledger.balance(&a.id), dec!(200));
        assert_eq!(ledger.balance(&b.id), dec!(-100));
        assert_eq!(ledger.balance(&c.id), dec!(-100));
        assert_eq!(ledger.balance_sum(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_to_base_uses_current_rates() {
        let session = signed_in_session();
        session.create_trip("trip", None, None).await.unwrap();

        // USD at the seeded 31.5 rate.
        let base = session.to_base(dec!(10), &CurrencyId::new("2")).unwrap();
        assert_eq!(base, dec!(315));

        let err = session.to_base(dec!(1), &CurrencyId::new("nope")).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    mod hanging_remote {
        use super::*;
        use async_trait::async_trait;
        use tripsplit_store::{Result as StoreResult, Subscription};

        /// A remote whose calls never complete; drives the timeout path.
        pub struct HangingRemote;

        async fn hang<T>() -> StoreResult<T> {
            std::future::pending().await
        }

        #[async_trait]
        impl RemoteStore for HangingRemote {
            async fn insert_trip(&self, _: TripDraft) -> StoreResult<Trip> {
                hang().await
            }
            async fn get_trip(&self, _: &TripId) -> StoreResult<Trip> {
                hang().await
            }
            async fn update_trip_settings(
                &self,
                _: &TripId,
                _: &TripSettings,
            ) -> StoreResult<()> {
                hang().await
            }
            async fn insert_expense(
                &self,
                _: &TripId,
                _: ExpenseDraft,
                _: &str,
            ) -> StoreResult<ExpenseRecord> {
                hang().await
            }
            async fn update_expense(
                &self,
                _: &TripId,
                _: &ExpenseId,
                _: ExpenseDraft,
            ) -> StoreResult<ExpenseRecord> {
                hang().await
            }
            async fn delete_expense(&self, _: &TripId, _: &ExpenseId) -> StoreResult<()> {
                hang().await
            }
            async fn list_expenses(&self, _: &TripId) -> StoreResult<Vec<ExpenseRecord>> {
                hang().await
            }
            async fn subscribe(&self, _: &TripId) -> StoreResult<Subscription> {
                hang().await
            }
        }
    }

    #[tokio::test]
    async fn test_hung_remote_surfaces_timeout() {
        let auth = MemoryAuth::signed_in(User {
            id: UserId::new("u-1"),
            email: None,
        });
        let config = SessionConfig {
            remote_timeout: Duration::from_millis(10),
            retry: RetryPolicy::none(),
            unknown_person: UnknownPersonPolicy::AutoVivify,
        };
        let session = TripSession::with_config(
            hanging_remote::HangingRemote,
            MemoryCache::new(),
            auth,
            config,
        );

        let err = session.create_trip("trip", None, None).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)));
    }
}
