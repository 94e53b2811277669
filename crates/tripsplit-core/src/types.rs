//! Strong type definitions for Tripsplit.
//!
//! All identifiers are newtypes to prevent misuse at compile time. They wrap
//! opaque strings: trips and expenses get their ids from the remote store,
//! while roster members (people, categories, currencies) are minted locally
//! and travel inside the settings blob.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw id string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// Identifier of a trip (remote-assigned row key).
    TripId
);

opaque_id!(
    /// Identifier of an expense record (remote-assigned row key).
    ExpenseId
);

opaque_id!(
    /// Identifier of a person in a trip roster.
    ///
    /// Statistics key on this id, never on the display name, so renames
    /// don't orphan balances.
    PersonId
);

opaque_id!(
    /// Identifier of a spending category.
    CategoryId
);

opaque_id!(
    /// Identifier of a currency in the trip's currency table.
    CurrencyId
);

opaque_id!(
    /// Identifier of an authenticated user account.
    UserId
);

/// An authenticated user as reported by the auth boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
}

impl User {
    /// Display handle: email if known, otherwise the raw id.
    pub fn handle(&self) -> &str {
        self.email.as_deref().unwrap_or(self.id.as_str())
    }
}
