//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: in-memory backends wired the
//! way a real deployment wires the hosted ones.

use std::sync::Arc;

use rust_decimal::Decimal;

use tripsplit::Client;
use tripsplit_core::{
    CategoryId, CurrencyId, ExpenseDraft, Person, PersonId, User, UserId,
};
use tripsplit_store::{MemoryAuth, MemoryCache, MemoryRemote};
use tripsplit_sync::{SessionConfig, TripSession};

/// Shared in-memory backends for one test scenario.
///
/// All handles are `Arc`s: hand the same remote to several sessions to
/// simulate multiple participants.
pub struct TestFixture {
    pub remote: Arc<MemoryRemote>,
    pub cache: Arc<MemoryCache>,
    pub auth: Arc<MemoryAuth>,
}

impl TestFixture {
    /// Backends with a signed-in test user.
    pub fn new() -> Self {
        Self {
            remote: Arc::new(MemoryRemote::new()),
            cache: Arc::new(MemoryCache::new()),
            auth: Arc::new(MemoryAuth::signed_in(test_user("u-1"))),
        }
    }

    /// Backends with nobody signed in.
    pub fn signed_out() -> Self {
        Self {
            remote: Arc::new(MemoryRemote::new()),
            cache: Arc::new(MemoryCache::new()),
            auth: Arc::new(MemoryAuth::new()),
        }
    }

    /// A sync session over this fixture's backends.
    pub fn session(&self) -> TripSession<Arc<MemoryRemote>, Arc<MemoryCache>, Arc<MemoryAuth>> {
        TripSession::new(
            Arc::clone(&self.remote),
            Arc::clone(&self.cache),
            Arc::clone(&self.auth),
        )
    }

    /// A sync session with explicit configuration.
    pub fn session_with_config(
        &self,
        config: SessionConfig,
    ) -> TripSession<Arc<MemoryRemote>, Arc<MemoryCache>, Arc<MemoryAuth>> {
        TripSession::with_config(
            Arc::clone(&self.remote),
            Arc::clone(&self.cache),
            Arc::clone(&self.auth),
            config,
        )
    }

    /// A client over this fixture's backends.
    pub fn client(&self) -> Client<Arc<MemoryRemote>, Arc<MemoryCache>, Arc<MemoryAuth>> {
        Client::new(
            Arc::clone(&self.remote),
            Arc::clone(&self.cache),
            Arc::clone(&self.auth),
        )
    }

    /// A client for another participant: same remote, own auth and cache.
    pub fn participant_client(
        &self,
        user_id: &str,
    ) -> Client<Arc<MemoryRemote>, Arc<MemoryCache>, Arc<MemoryAuth>> {
        Client::new(
            Arc::clone(&self.remote),
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryAuth::signed_in(test_user(user_id))),
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A deterministic test user.
pub fn test_user(id: &str) -> User {
    User {
        id: UserId::new(id),
        email: Some(format!("{id}@example.com")),
    }
}

/// A roster of people with predictable ids (`p-0`, `p-1`, ...).
pub fn roster(names: &[&str]) -> Vec<Person> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| Person {
            id: PersonId::new(format!("p-{i}")),
            name: name.to_string(),
        })
        .collect()
}

/// A base-unit expense draft with sensible defaults.
pub fn expense_draft(
    date: &str,
    amount: Decimal,
    payer: &PersonId,
    participants: &[PersonId],
) -> ExpenseDraft {
    ExpenseDraft {
        date: date.to_string(),
        item_name: "shared cost".into(),
        category: CategoryId::new("1"),
        amount,
        original_amount: None,
        currency: CurrencyId::new("1"),
        participants: participants.to_vec(),
        payer: payer.clone(),
        note: String::new(),
    }
}
