//! Expense records and their validation.
//!
//! An [`ExpenseDraft`] is what a user submits: everything except the
//! remote-assigned id and the derived average. Validation happens on the
//! draft, before any remote call, and fixes `average_amount` at that point.
//!
//! `average_amount` is a cached derived field, not a source of truth: it is
//! recomputed on every add/update, and the ledger engine recomputes the
//! share from scratch rather than trusting the stored value.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::even_share;
use crate::types::{CategoryId, CurrencyId, ExpenseId, PersonId};

/// A single shared expense, as held in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: ExpenseId,
    /// User-supplied calendar date string (`YYYY-MM-DD` expected). Lists are
    /// ordered by this field descending, matching the remote store.
    pub date: String,
    pub item_name: String,
    /// Reference to a category id. Dangling references are tolerated:
    /// deleting a category does not rewrite existing expenses.
    pub category: CategoryId,
    /// Canonical amount in the trip's base currency. Every statistic is
    /// computed from this field.
    pub amount: Decimal,
    /// The amount as originally entered, before conversion. Display only.
    #[serde(default)]
    pub original_amount: Option<Decimal>,
    /// The currency the expense was entered in.
    pub currency: CurrencyId,
    /// Who shares this cost. Non-empty; insertion order is preserved for
    /// display but carries no meaning.
    pub participants: Vec<PersonId>,
    /// Who fronted the money. Need not appear in `participants`.
    pub payer: PersonId,
    /// Cached `amount / participants.len()`, fixed at write time.
    pub average_amount: Decimal,
    #[serde(default)]
    pub note: String,
}

impl ExpenseRecord {
    /// Recompute the per-participant share from the authoritative fields.
    ///
    /// Used to detect drift between the cached `average_amount` and the
    /// value it is supposed to cache.
    pub fn recomputed_average(&self) -> Result<Decimal, ValidationError> {
        if self.participants.is_empty() {
            return Err(ValidationError::EmptyParticipants);
        }
        Ok(even_share(self.amount, self.participants.len()))
    }

    /// Replace all mutable fields from a draft, preserving the id.
    ///
    /// This is the full-replace update of the record store; the cached
    /// average is recomputed from the new fields.
    pub fn apply(&self, draft: ExpenseDraft) -> Result<ExpenseRecord, ValidationError> {
        draft.into_record(self.id.clone())
    }
}

/// An expense as submitted by a user, before the remote assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub date: String,
    pub item_name: String,
    pub category: CategoryId,
    pub amount: Decimal,
    #[serde(default)]
    pub original_amount: Option<Decimal>,
    pub currency: CurrencyId,
    pub participants: Vec<PersonId>,
    pub payer: PersonId,
    #[serde(default)]
    pub note: String,
}

impl ExpenseDraft {
    /// Check the record-store invariants: non-empty participants,
    /// non-negative amount.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.participants.is_empty() {
            return Err(ValidationError::EmptyParticipants);
        }
        if self.amount < Decimal::ZERO {
            return Err(ValidationError::NegativeAmount(self.amount));
        }
        Ok(())
    }

    /// The per-participant share this draft would carry.
    pub fn average_amount(&self) -> Result<Decimal, ValidationError> {
        self.validate()?;
        Ok(even_share(self.amount, self.participants.len()))
    }

    /// Promote the draft to a full record under the given id.
    pub fn into_record(self, id: ExpenseId) -> Result<ExpenseRecord, ValidationError> {
        let average_amount = self.average_amount()?;
        Ok(ExpenseRecord {
            id,
            date: self.date,
            item_name: self.item_name,
            category: self.category,
            amount: self.amount,
            original_amount: self.original_amount,
            currency: self.currency,
            participants: self.participants,
            payer: self.payer,
            average_amount,
            note: self.note,
        })
    }
}

/// Ordering used by every expense list: date descending.
///
/// Ties compare equal so that a stable sort preserves insertion order,
/// matching the remote store's `order by date desc` behavior.
pub fn compare_date_desc(a: &ExpenseRecord, b: &ExpenseRecord) -> Ordering {
    b.date.cmp(&a.date)
}

/// Stable-sort a list into the canonical display order.
pub fn sort_date_desc(expenses: &mut [ExpenseRecord]) {
    expenses.sort_by(compare_date_desc);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(amount: Decimal, participants: &[&str]) -> ExpenseDraft {
        ExpenseDraft {
            date: "2025-07-01".into(),
            item_name: "dinner".into(),
            category: CategoryId::new("c-food"),
            amount,
            original_amount: None,
            currency: CurrencyId::new("twd"),
            participants: participants.iter().map(|p| PersonId::new(*p)).collect(),
            payer: PersonId::new("a"),
            note: String::new(),
        }
    }

    #[test]
    fn test_reject_empty_participants() {
        let d = draft(dec!(100), &[]);
        assert_eq!(d.validate(), Err(ValidationError::EmptyParticipants));
        assert!(d.into_record(ExpenseId::new("e-1")).is_err());
    }

    #[test]
    fn test_reject_negative_amount() {
        let d = draft(dec!(-1), &["a"]);
        assert_eq!(d.validate(), Err(ValidationError::NegativeAmount(dec!(-1))));
    }

    #[test]
    fn test_average_fixed_at_creation() {
        let record = draft(dec!(300), &["a", "b", "c"])
            .into_record(ExpenseId::new("e-1"))
            .unwrap();
        assert_eq!(record.average_amount, dec!(100));
        assert_eq!(record.recomputed_average().unwrap(), dec!(100));
    }

    #[test]
    fn test_update_recomputes_average() {
        let record = draft(dec!(300), &["a", "b", "c"])
            .into_record(ExpenseId::new("e-1"))
            .unwrap();
        let updated = record.apply(draft(dec!(300), &["a", "b"])).unwrap();
        assert_eq!(updated.id, record.id);
        assert_eq!(updated.average_amount, dec!(150));
    }

    #[test]
    fn test_share_sum_recovers_amount() {
        let record = draft(dec!(100), &["a", "b", "c"])
            .into_record(ExpenseId::new("e-1"))
            .unwrap();
        let total: Decimal = (0..3).map(|_| record.average_amount).sum();
        assert!((record.amount - total).abs() < dec!(0.000001));
    }

    #[test]
    fn test_sort_date_desc_preserves_insertion_on_ties() {
        let mut list = vec![
            draft(dec!(1), &["a"]).into_record(ExpenseId::new("e-1")).unwrap(),
            draft(dec!(2), &["a"]).into_record(ExpenseId::new("e-2")).unwrap(),
        ];
        list[1].date = "2025-07-02".into();
        sort_date_desc(&mut list);
        assert_eq!(list[0].id, ExpenseId::new("e-2"));

        // Same-date records keep their relative order.
        let mut tied = vec![
            draft(dec!(1), &["a"]).into_record(ExpenseId::new("t-1")).unwrap(),
            draft(dec!(2), &["a"]).into_record(ExpenseId::new("t-2")).unwrap(),
        ];
        sort_date_desc(&mut tied);
        assert_eq!(tied[0].id, ExpenseId::new("t-1"));
        assert_eq!(tied[1].id, ExpenseId::new("t-2"));
    }

    #[test]
    fn test_record_json_roundtrip() {
        let record = draft(dec!(315), &["a", "b"])
            .into_record(ExpenseId::new("e-9"))
            .unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: ExpenseRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
