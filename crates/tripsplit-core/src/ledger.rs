//! The settlement ledger: pure statistics over expenses and a roster.
//!
//! This module does no I/O and holds no state. Call it on an immutable
//! snapshot of the expense list; callers decide when to recompute (the sync
//! crate exposes a revision counter for exactly that).
//!
//! The core correctness invariant of the whole system lives here:
//! conservation of money. Every unit someone paid is a unit someone spent,
//! so balances sum to zero across all persons.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::expense::ExpenseRecord;
use crate::money::even_share;
use crate::trip::Person;
use crate::types::{CategoryId, ExpenseId, PersonId};

/// What to do when an expense references a person id missing from the
/// roster (a stale roster edit, or a payer who never joined).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownPersonPolicy {
    /// Create a ledger entry for the unknown id rather than dropping the
    /// amount. Resilience to stale rosters beats strict referential
    /// integrity.
    #[default]
    AutoVivify,
    /// Reject the computation with [`ValidationError::UnknownPerson`].
    Reject,
}

/// Per-person totals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonStats {
    /// Sum of this person's shares across expenses they participate in.
    pub total_spent: Decimal,
    /// Sum of full amounts for expenses this person fronted.
    pub total_paid: Decimal,
    /// `total_paid - total_spent`. Positive: owed money. Negative: owes.
    pub balance: Decimal,
    /// Number of expenses this person participates in.
    pub expense_count: u64,
    /// Number of expenses this person fronted.
    pub paid_count: u64,
    /// The expenses this person participates in, in input order.
    pub items: Vec<ExpenseId>,
}

/// The full per-person ledger, keyed by stable person id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ledger {
    pub per_person: HashMap<PersonId, PersonStats>,
}

impl Ledger {
    pub fn stats(&self, person: &PersonId) -> Option<&PersonStats> {
        self.per_person.get(person)
    }

    pub fn balance(&self, person: &PersonId) -> Decimal {
        self.per_person
            .get(person)
            .map(|s| s.balance)
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of all balances. Zero (within decimal epsilon) by construction.
    pub fn balance_sum(&self) -> Decimal {
        self.per_person.values().map(|s| s.balance).sum()
    }
}

/// Totals for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: CategoryId,
    pub total: Decimal,
    pub count: u64,
}

/// Compute per-person statistics from an expense list and a roster.
///
/// Shares are recomputed from `amount / participants.len()` — the stored
/// `average_amount` cache is deliberately not trusted, so drift introduced
/// by a buggy writer cannot corrupt settlements.
pub fn compute_ledger(
    expenses: &[ExpenseRecord],
    people: &[Person],
    policy: UnknownPersonPolicy,
) -> Result<Ledger, ValidationError> {
    let mut per_person: HashMap<PersonId, PersonStats> = people
        .iter()
        .map(|p| (p.id.clone(), PersonStats::default()))
        .collect();

    for expense in expenses {
        if expense.participants.is_empty() {
            return Err(ValidationError::EmptyParticipants);
        }
        let share = even_share(expense.amount, expense.participants.len());

        for participant in &expense.participants {
            let stats = entry(&mut per_person, participant, policy)?;
            stats.total_spent += share;
            stats.expense_count += 1;
            stats.items.push(expense.id.clone());
        }

        let payer = entry(&mut per_person, &expense.payer, policy)?;
        payer.total_paid += expense.amount;
        payer.paid_count += 1;
    }

    for stats in per_person.values_mut() {
        stats.balance = stats.total_paid - stats.total_spent;
    }

    Ok(Ledger { per_person })
}

fn entry<'a>(
    per_person: &'a mut HashMap<PersonId, PersonStats>,
    person: &PersonId,
    policy: UnknownPersonPolicy,
) -> Result<&'a mut PersonStats, ValidationError> {
    match policy {
        UnknownPersonPolicy::AutoVivify => {
            Ok(per_person.entry(person.clone()).or_default())
        }
        UnknownPersonPolicy::Reject => per_person
            .get_mut(person)
            .ok_or_else(|| ValidationError::UnknownPerson(person.clone())),
    }
}

/// Group expenses by category id, summing canonical amounts.
///
/// Independent of participant splitting: the sum over all categories equals
/// the sum of all expense amounts. Dangling category ids form their own
/// groups. Output preserves first-seen order.
pub fn category_totals(expenses: &[ExpenseRecord]) -> Vec<CategoryTotal> {
    let mut order: Vec<CategoryId> = Vec::new();
    let mut totals: HashMap<CategoryId, (Decimal, u64)> = HashMap::new();

    for expense in expenses {
        let slot = totals.entry(expense.category.clone()).or_insert_with(|| {
            order.push(expense.category.clone());
            (Decimal::ZERO, 0)
        });
        slot.0 += expense.amount;
        slot.1 += 1;
    }

    order
        .into_iter()
        .map(|category| {
            let (total, count) = totals[&category];
            CategoryTotal { category, total, count }
        })
        .collect()
}
