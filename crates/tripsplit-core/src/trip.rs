//! Trips and their settings aggregate.
//!
//! People, categories, and currencies travel together as one
//! [`TripSettings`] blob: the remote stores them as a single JSON document
//! per trip, so every roster edit is a read-modify-write of the whole
//! aggregate (see the sync crate for the serialization discipline this
//! forces).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{CategoryId, CurrencyId, PersonId, TripId, UserId};

/// A member of the trip roster. Identity is by `id`; names need not be
/// unique and may be edited freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
}

/// A spending category. `color` is a display hint with no computational
/// meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub color: String,
}

/// A currency and its conversion rate into the trip's base unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub id: CurrencyId,
    pub name: String,
    pub symbol: String,
    /// Units of base currency per 1 unit of this currency.
    pub rate: Decimal,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

/// The roster of people, categories, and currencies for one trip.
///
/// Always persisted as a single unit, never field-by-field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TripSettings {
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub currencies: Vec<Currency>,
}

impl TripSettings {
    /// Write-time invariant check: at most one default currency, and the
    /// default's rate must be exactly 1.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut default = None;
        for currency in &self.currencies {
            if currency.is_default {
                if default.is_some() {
                    return Err(ValidationError::MultipleDefaultCurrencies);
                }
                if currency.rate != Decimal::ONE {
                    return Err(ValidationError::DefaultRateNotOne {
                        id: currency.id.clone(),
                        rate: currency.rate,
                    });
                }
                default = Some(&currency.id);
            }
        }
        Ok(())
    }

    /// Seed settings for a freshly created trip with nothing supplied.
    pub fn seed() -> Self {
        fn c(id: &str, name: &str, symbol: &str, rate: &str, is_default: bool) -> Currency {
            Currency {
                id: CurrencyId::new(id),
                name: name.to_string(),
                symbol: symbol.to_string(),
                rate: rate.parse().unwrap_or(Decimal::ONE),
                is_default,
            }
        }
        fn cat(id: &str, name: &str, color: &str) -> Category {
            Category {
                id: CategoryId::new(id),
                name: name.to_string(),
                color: color.to_string(),
            }
        }

        Self {
            people: Vec::new(),
            currencies: vec![
                c("1", "New Taiwan Dollar", "TWD", "1", true),
                c("2", "US Dollar", "USD", "31.5", false),
                c("3", "Japanese Yen", "JPY", "0.21", false),
                c("4", "Euro", "EUR", "34.2", false),
                c("5", "Korean Won", "KRW", "0.024", false),
            ],
            categories: vec![
                cat("1", "Sightseeing", "#e3f2fd"),
                cat("2", "Transport", "#f3e5f5"),
                cat("3", "Entertainment", "#e8f5e8"),
                cat("4", "Tickets", "#ffebee"),
                cat("5", "Food", "#f3e5f5"),
                cat("6", "Lodging", "#e1f5fe"),
            ],
        }
    }
}

/// A trip row as held by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Display handles of everyone who joined the trip.
    #[serde(default)]
    pub members: Vec<String>,
    pub settings: TripSettings,
    pub created_by: UserId,
    /// Unix milliseconds, assigned by the remote.
    pub created_at: i64,
    pub updated_at: i64,
}

/// A trip as submitted for creation, before the remote assigns server
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    pub settings: TripSettings,
    pub created_by: UserId,
}
