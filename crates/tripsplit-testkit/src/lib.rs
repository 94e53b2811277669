//! # Tripsplit Testkit
//!
//! Testing utilities for the Tripsplit workspace: in-memory backend
//! fixtures and proptest generators for expense data.
//!
//! The settlement engine's load-bearing properties (conservation, average
//! correctness, category partition) are exercised here against generated
//! expense sets.

pub mod fixtures;
pub mod generators;

pub use fixtures::{expense_draft, roster, test_user, TestFixture};
pub use generators::{
    amount, category_id, date, expense_set, person_id, pool_roster, record_from_params,
    ExpenseParams,
};
