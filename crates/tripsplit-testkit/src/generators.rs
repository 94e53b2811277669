//! Proptest generators for property-based testing.

use proptest::prelude::*;
use rust_decimal::Decimal;

use tripsplit_core::{
    CategoryId, CurrencyId, ExpenseDraft, ExpenseId, ExpenseRecord, Person, PersonId,
};

/// Generate a person id drawn from a small pool, so expenses overlap.
pub fn person_id(pool: usize) -> impl Strategy<Value = PersonId> {
    (0..pool).prop_map(|i| PersonId::new(format!("p-{i}")))
}

/// The roster matching [`person_id`]'s pool.
pub fn pool_roster(pool: usize) -> Vec<Person> {
    (0..pool)
        .map(|i| Person {
            id: PersonId::new(format!("p-{i}")),
            name: format!("person {i}"),
        })
        .collect()
}

/// Generate a non-negative amount with cents granularity.
pub fn amount() -> impl Strategy<Value = Decimal> {
    (0u64..10_000_000).prop_map(|cents| Decimal::from(cents) / Decimal::from(100))
}

/// Generate a plausible ISO date within one trip's span.
pub fn date() -> impl Strategy<Value = String> {
    (1u32..=12, 1u32..=28).prop_map(|(m, d)| format!("2025-{m:02}-{d:02}"))
}

/// Generate a category id drawn from a small pool.
pub fn category_id() -> impl Strategy<Value = CategoryId> {
    (1u32..=6).prop_map(|i| CategoryId::new(i.to_string()))
}

/// Parameters for generating an expense record.
#[derive(Debug, Clone)]
pub struct ExpenseParams {
    pub date: String,
    pub amount: Decimal,
    pub category: CategoryId,
    pub payer: PersonId,
    pub participants: Vec<PersonId>,
}

impl Arbitrary for ExpenseParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        const POOL: usize = 5;
        (
            date(),
            amount(),
            category_id(),
            person_id(POOL),
            prop::collection::btree_set(0..POOL, 1..=POOL),
        )
            .prop_map(|(date, amount, category, payer, participant_ix)| ExpenseParams {
                date,
                amount,
                category,
                payer,
                participants: participant_ix
                    .into_iter()
                    .map(|i| PersonId::new(format!("p-{i}")))
                    .collect(),
            })
            .boxed()
    }
}

/// Build a record from parameters, with a sequential id.
pub fn record_from_params(index: usize, params: &ExpenseParams) -> ExpenseRecord {
    ExpenseDraft {
        date: params.date.clone(),
        item_name: format!("item {index}"),
        category: params.category.clone(),
        amount: params.amount,
        original_amount: None,
        currency: CurrencyId::new("1"),
        participants: params.participants.clone(),
        payer: params.payer.clone(),
        note: String::new(),
    }
    .into_record(ExpenseId::new(format!("exp-{index}")))
    .expect("generated drafts are valid")
}

/// Generate a whole expense set over the shared person pool.
pub fn expense_set(max_len: usize) -> impl Strategy<Value = Vec<ExpenseRecord>> {
    prop::collection::vec(any::<ExpenseParams>(), 0..=max_len).prop_map(|params| {
        params
            .iter()
            .enumerate()
            .map(|(i, p)| record_from_params(i, p))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripsplit_core::{
        category_totals, compute_ledger, sort_date_desc, UnknownPersonPolicy,
    };

    fn eps() -> Decimal {
        "0.000001".parse().unwrap()
    }

    proptest! {
        /// Conservation of money: balances always sum to zero.
        #[test]
        fn test_conservation(expenses in expense_set(25)) {
            let ledger = compute_ledger(
                &expenses,
                &pool_roster(5),
                UnknownPersonPolicy::AutoVivify,
            )
            .unwrap();
            prop_assert!(
                ledger.balance_sum().abs() < eps(),
                "balance sum {} exceeds epsilon",
                ledger.balance_sum()
            );
        }

        /// The cached average always equals the recomputed share, and the
        /// shares of one expense recover its amount.
        #[test]
        fn test_average_correctness(params: ExpenseParams) {
            let record = record_from_params(0, &params);
            prop_assert_eq!(
                record.average_amount,
                record.recomputed_average().unwrap()
            );

            let total: Decimal = (0..record.participants.len())
                .map(|_| record.average_amount)
                .sum();
            prop_assert!((total - record.amount).abs() < eps());
        }

        /// Category totals partition the grand total.
        #[test]
        fn test_category_partition(expenses in expense_set(25)) {
            let grand: Decimal = expenses.iter().map(|e| e.amount).sum();
            let by_category: Decimal =
                category_totals(&expenses).iter().map(|t| t.total).sum();
            prop_assert_eq!(grand, by_category);
        }

        /// Sorting is idempotent and never loses records.
        #[test]
        fn test_sort_stable(mut expenses in expense_set(25)) {
            let len = expenses.len();
            sort_date_desc(&mut expenses);
            prop_assert_eq!(expenses.len(), len);
            let once = expenses.clone();
            sort_date_desc(&mut expenses);
            prop_assert_eq!(expenses, once);
        }

        /// Statistics tolerate ids outside the roster without losing money.
        #[test]
        fn test_conservation_with_empty_roster(expenses in expense_set(25)) {
            // Nobody preinitialized: every entry is auto-vivified.
            let ledger =
                compute_ledger(&expenses, &[], UnknownPersonPolicy::AutoVivify).unwrap();
            prop_assert!(ledger.balance_sum().abs() < eps());

            let paid: Decimal = expenses.iter().map(|e| e.amount).sum();
            let ledger_paid: Decimal =
                ledger.per_person.values().map(|s| s.total_paid).sum();
            prop_assert_eq!(paid, ledger_paid);
        }
    }
}
