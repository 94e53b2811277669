//! The Client: unified API for the Tripsplit system.
//!
//! A [`Client`] ties auth, the remote store, the local cache, and the sync
//! session into one interface for building applications: create or load a
//! trip, record expenses in any configured currency, edit the roster, and
//! read settlement statistics.

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::info;

use tripsplit_core::{
    Category, CategoryId, CategoryTotal, Currency, CurrencyId, ExpenseDraft, ExpenseId,
    ExpenseRecord, Ledger, Person, PersonId, Trip, TripId, TripSettings, User,
};
use tripsplit_store::{AuthProvider, RemoteStore, SnapshotCache};
use tripsplit_sync::{SessionConfig, SessionState, TripSession};

use crate::error::Result;

/// A user-entered expense, in whatever currency it was paid.
///
/// The client converts it into the trip's base unit at recording time: the
/// canonical `amount` is fixed (and rounded) exactly once, here. For the
/// default currency the entered value is already canonical and no
/// `original_amount` is retained.
#[derive(Debug, Clone)]
pub struct ExpenseInput {
    pub date: String,
    pub item_name: String,
    pub category: CategoryId,
    /// The amount as entered, in `currency` units.
    pub entered_amount: Decimal,
    pub currency: CurrencyId,
    pub participants: Vec<PersonId>,
    pub payer: PersonId,
    pub note: String,
}

/// The main client struct.
///
/// Provides a unified API for:
/// - Creating and loading trips
/// - Recording, updating, and deleting expenses
/// - Editing the roster (people, categories, currencies)
/// - Reading settlement and category statistics
/// - Reacting to remote changes and sign-out
pub struct Client<R, C, A> {
    session: TripSession<R, C, A>,
    /// Auth session watch; drained by [`Client::process_session_change`].
    session_watch: watch::Receiver<Option<User>>,
}

impl<R, C, A> Client<R, C, A>
where
    R: RemoteStore,
    C: SnapshotCache,
    A: AuthProvider,
{
    /// Create a client with default configuration.
    pub fn new(remote: R, cache: C, auth: A) -> Self {
        Self::with_config(remote, cache, auth, SessionConfig::default())
    }

    pub fn with_config(remote: R, cache: C, auth: A, config: SessionConfig) -> Self {
        let session_watch = auth.session_changes();
        Self {
            session: TripSession::with_config(remote, cache, auth, config),
            session_watch,
        }
    }

    /// The underlying sync session.
    pub fn session(&self) -> &TripSession<R, C, A> {
        &self.session
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Trip Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a trip (default settings unless supplied) and make it active.
    pub async fn create_trip(
        &self,
        name: &str,
        description: Option<&str>,
        settings: Option<TripSettings>,
    ) -> Result<Trip> {
        Ok(self.session.create_trip(name, description, settings).await?)
    }

    /// Load a trip and its expenses from the remote.
    pub async fn load_trip(&self, id: &TripId) -> Result<Trip> {
        Ok(self.session.load_trip(id).await?)
    }

    /// Start from the last cached snapshot, if one exists.
    pub async fn restore_cached(&self, id: &TripId) -> Result<bool> {
        Ok(self.session.restore_cached(id).await?)
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn trip(&self) -> Option<Trip> {
        self.session.trip()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expenses
    // ─────────────────────────────────────────────────────────────────────────

    /// Record an expense entered in any configured currency.
    ///
    /// Converts into the base unit through the trip's currency table,
    /// failing fast with `UnknownCurrency` before any remote call.
    pub async fn record_expense(&self, input: ExpenseInput) -> Result<ExpenseRecord> {
        let table = self.session.currency_table();
        let is_default = table.default_currency() == Some(&input.currency);
        let (amount, original_amount) = if is_default {
            (input.entered_amount, None)
        } else {
            let base = table.to_base(input.entered_amount, &input.currency)?;
            (base, Some(input.entered_amount))
        };

        let draft = ExpenseDraft {
            date: input.date,
            item_name: input.item_name,
            category: input.category,
            amount,
            original_amount,
            currency: input.currency,
            participants: input.participants,
            payer: input.payer,
            note: input.note,
        };
        Ok(self.session.add_expense(draft).await?)
    }

    /// Add an expense already expressed in the base unit.
    pub async fn add_expense(&self, draft: ExpenseDraft) -> Result<ExpenseRecord> {
        Ok(self.session.add_expense(draft).await?)
    }

    pub async fn update_expense(
        &self,
        id: &ExpenseId,
        draft: ExpenseDraft,
    ) -> Result<ExpenseRecord> {
        Ok(self.session.update_expense(id, draft).await?)
    }

    pub async fn delete_expense(&self, id: &ExpenseId) -> Result<()> {
        Ok(self.session.delete_expense(id).await?)
    }

    pub fn expenses(&self) -> Vec<ExpenseRecord> {
        self.session.expenses()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Roster
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn add_person(&self, name: &str) -> Result<Person> {
        Ok(self.session.add_person(name).await?)
    }

    pub async fn remove_person(&self, id: &PersonId) -> Result<()> {
        Ok(self.session.remove_person(id).await?)
    }

    pub async fn add_category(&self, name: &str, color: &str) -> Result<Category> {
        Ok(self.session.add_category(name, color).await?)
    }

    pub async fn remove_category(&self, id: &CategoryId) -> Result<()> {
        Ok(self.session.remove_category(id).await?)
    }

    pub async fn add_currency(&self, name: &str, symbol: &str, rate: Decimal) -> Result<Currency> {
        Ok(self.session.add_currency(name, symbol, rate).await?)
    }

    pub async fn remove_currency(&self, id: &CurrencyId) -> Result<()> {
        Ok(self.session.remove_currency(id).await?)
    }

    pub async fn update_currency_rate(&self, id: &CurrencyId, rate: Decimal) -> Result<()> {
        Ok(self.session.update_currency_rate(id, rate).await?)
    }

    pub fn people(&self) -> Vec<Person> {
        self.session.people()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.session.categories()
    }

    pub fn currencies(&self) -> Vec<Currency> {
        self.session.currencies()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statistics
    // ─────────────────────────────────────────────────────────────────────────

    /// Per-person settlement ledger for the current snapshot.
    pub fn ledger(&self) -> Result<Ledger> {
        Ok(self.session.ledger()?)
    }

    /// Per-category totals for the current snapshot.
    pub fn category_statistics(&self) -> Vec<CategoryTotal> {
        self.session.category_statistics()
    }

    /// Bumped by every mutation; recompute statistics when it moves.
    pub fn revision(&self) -> u64 {
        self.session.revision()
    }

    /// Last recorded remote failure, for UI display.
    pub fn last_error(&self) -> Option<String> {
        self.session.last_error()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply queued remote change notifications, if any. Returns whether a
    /// re-fetch happened.
    pub async fn sync_remote_changes(&self) -> Result<bool> {
        Ok(self.session.poll_changes().await?)
    }

    /// React to auth session changes observed since the last call.
    ///
    /// On sign-out, all trip-scoped local state and cached snapshots are
    /// cleared. Returns whether a sign-out was handled.
    pub async fn process_session_change(&mut self) -> Result<bool> {
        if !self.session_watch.has_changed().unwrap_or(false) {
            return Ok(false);
        }
        let signed_out = self.session_watch.borrow_and_update().is_none();
        if signed_out {
            info!("session ended, clearing trip-scoped state");
            self.session.handle_sign_out().await?;
        }
        Ok(signed_out)
    }
}
