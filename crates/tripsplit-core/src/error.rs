//! Error types for Tripsplit core.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{CurrencyId, PersonId};

/// Validation errors for expenses and trip settings.
///
/// These are all rejected before any remote call is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expense has no participants")]
    EmptyParticipants,

    #[error("expense amount must not be negative: {0}")]
    NegativeAmount(Decimal),

    #[error("unknown currency: {0}")]
    UnknownCurrency(CurrencyId),

    #[error("settings declare more than one default currency")]
    MultipleDefaultCurrencies,

    #[error("default currency {id} must have rate 1, got {rate}")]
    DefaultRateNotOne { id: CurrencyId, rate: Decimal },

    #[error("unknown person: {0}")]
    UnknownPerson(PersonId),
}
