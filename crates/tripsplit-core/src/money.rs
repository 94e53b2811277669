//! Monetary helpers.
//!
//! All amounts are `rust_decimal::Decimal`. Binary floats never touch
//! monetary arithmetic: repeated division and addition over shares must not
//! drift.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places of the base currency's smallest unit.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Round to the smallest unit of the base currency.
///
/// Banker's rounding, applied exactly once at the point a canonical amount
/// is fixed (currency conversion at expense creation). Amounts read back
/// from storage are never re-rounded.
pub fn round_minor(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Even share of `amount` across `participants` people.
///
/// The result is intentionally left at full decimal precision; the sum of
/// all shares recovers `amount` to within decimal epsilon. Callers must
/// guard `participants > 0` (see `ExpenseDraft::validate`).
pub fn even_share(amount: Decimal, participants: usize) -> Decimal {
    debug_assert!(participants > 0);
    amount / Decimal::from(participants as u64)
}
