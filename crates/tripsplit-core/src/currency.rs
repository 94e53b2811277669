//! The currency table: conversion into the trip's base unit.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::round_minor;
use crate::trip::Currency;
use crate::types::CurrencyId;

/// Rate lookup table built from a trip's currency settings.
///
/// The table itself imposes no rounding; [`CurrencyTable::to_base`] is the
/// single place a canonical amount gets fixed to the base currency's minor
/// unit.
#[derive(Debug, Clone, Default)]
pub struct CurrencyTable {
    rates: HashMap<CurrencyId, Decimal>,
    default: Option<CurrencyId>,
}

impl CurrencyTable {
    pub fn from_currencies(currencies: &[Currency]) -> Self {
        let rates = currencies
            .iter()
            .map(|c| (c.id.clone(), c.rate))
            .collect();
        let default = currencies
            .iter()
            .find(|c| c.is_default)
            .map(|c| c.id.clone());
        Self { rates, default }
    }

    /// Units of base currency per 1 unit of `id`.
    pub fn rate(&self, id: &CurrencyId) -> Result<Decimal, ValidationError> {
        self.rates
            .get(id)
            .copied()
            .ok_or_else(|| ValidationError::UnknownCurrency(id.clone()))
    }

    /// Raw conversion: `amount * rate(id)`, unrounded.
    pub fn convert(&self, amount: Decimal, id: &CurrencyId) -> Result<Decimal, ValidationError> {
        Ok(amount * self.rate(id)?)
    }

    /// Canonical conversion: convert and round once to the base currency's
    /// minor unit (banker's rounding).
    pub fn to_base(&self, amount: Decimal, id: &CurrencyId) -> Result<Decimal, ValidationError> {
        Ok(round_minor(self.convert(amount, id)?))
    }

    /// The currency marked default, if the settings carry one.
    pub fn default_currency(&self) -> Option<&CurrencyId> {
        self.default.as_ref()
    }
}

impl From<&[Currency]> for CurrencyTable {
    fn from(currencies: &[Currency]) -> Self {
        Self::from_currencies(currencies)
    }
}
