//! # Tripsplit Core
//!
//! Pure primitives for Tripsplit: expense records, trip settings, currency
//! conversion, and the settlement ledger.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over shared-expense data.
//!
//! ## Key Types
//!
//! - [`ExpenseRecord`] / [`ExpenseDraft`] - a shared cost and its
//!   pre-validation form
//! - [`TripSettings`] - the people/categories/currencies aggregate
//! - [`CurrencyTable`] - conversion into the trip's base unit
//! - [`Ledger`] - per-person settlement totals
//!
//! ## Conservation
//!
//! The load-bearing invariant: for any expense set, per-person balances sum
//! to zero. See [`compute_ledger`].

pub mod currency;
pub mod error;
pub mod expense;
pub mod ledger;
pub mod money;
pub mod trip;
pub mod types;

pub use currency::CurrencyTable;
pub use error::ValidationError;
pub use expense::{compare_date_desc, sort_date_desc, ExpenseDraft, ExpenseRecord};
pub use ledger::{
    category_totals, compute_ledger, CategoryTotal, Ledger, PersonStats, UnknownPersonPolicy,
};
pub use money::{even_share, round_minor, MINOR_UNIT_SCALE};
pub use trip::{Category, Currency, Person, Trip, TripDraft, TripSettings};
pub use types::{CategoryId, CurrencyId, ExpenseId, PersonId, TripId, User, UserId};
