//! # Tripsplit
//!
//! Shared-trip expense tracking with settlement: who paid, who owes whom.
//!
//! The [`Client`] brings together the pure settlement engine
//! (`tripsplit-core`), the persistence boundaries (`tripsplit-store`), and
//! the sync coordinator (`tripsplit-sync`) into a cohesive interface.
//!
//! ## Overview
//!
//! ```rust,no_run
//! use tripsplit::Client;
//! use tripsplit_store::{MemoryAuth, MemoryCache, MemoryRemote};
//!
//! async fn example(auth: MemoryAuth) {
//!     let client = Client::new(MemoryRemote::new(), MemoryCache::new(), auth);
//!     // let trip = client.create_trip("tokyo", None, None).await?;
//!     // client.record_expense(input).await?;
//!     // let ledger = client.ledger()?;
//!     // ledger.balance(&person) > 0  =>  person is owed money
//! }
//! ```

pub mod client;
pub mod error;

pub use client::{Client, ExpenseInput};
pub use error::{ClientError, Result};

pub use tripsplit_core::{
    Category, CategoryId, CategoryTotal, Currency, CurrencyId, CurrencyTable, ExpenseDraft,
    ExpenseId, ExpenseRecord, Ledger, Person, PersonId, PersonStats, Trip, TripDraft, TripId,
    TripSettings, UnknownPersonPolicy, User, UserId, ValidationError,
};
pub use tripsplit_store::{
    AuthProvider, ChangeAction, ChangeEvent, MemoryAuth, MemoryCache, MemoryRemote, RemoteStore,
    SnapshotCache, SqliteCache, StoreError, Subscription, TripSnapshot,
};
pub use tripsplit_sync::{RetryPolicy, SessionConfig, SessionState, SyncError, TripSession};
