//! Identity types for Booky entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Raw numeric identifier assigned by the library API.
pub type RawId = i64;

/// Behaviour shared by all strongly-typed entity IDs.
pub trait EntityIdType: Copy + Eq + Hash + fmt::Display + fmt::Debug {
    /// Wrap a raw server identifier.
    fn new(raw: RawId) -> Self;

    /// Get the raw server identifier.
    fn as_raw(&self) -> RawId;
}

/// The API is inconsistent about whether IDs travel as numbers or strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdRepr {
    Number(i64),
    Text(String),
}

fn deserialize_raw_id<'de, D>(deserializer: D) -> Result<RawId, D::Error>
where
    D: Deserializer<'de>,
{
    match RawIdRepr::deserialize(deserializer)? {
        RawIdRepr::Number(n) => Ok(n),
        RawIdRepr::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(RawId);

        impl EntityIdType for $name {
            fn new(raw: RawId) -> Self {
                Self(raw)
            }

            fn as_raw(&self) -> RawId {
                self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserialize_raw_id(deserializer).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<RawId> for $name {
            fn from(raw: RawId) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(
    /// Identifier of a book in the catalogue.
    BookId
);
entity_id!(
    /// Identifier of an author.
    AuthorId
);
entity_id!(
    /// Identifier of a book category.
    CategoryId
);
entity_id!(
    /// Identifier of a loan (one borrowed copy).
    LoanId
);
entity_id!(
    /// Identifier of a persisted review.
    ReviewId
);
entity_id!(
    /// Identifier of a user account.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_accepts_number_and_string() {
        let from_number: BookId = serde_json::from_str("42").unwrap();
        let from_string: BookId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number.as_raw(), 42);
    }

    #[test]
    fn test_id_rejects_non_numeric_string() {
        assert!(serde_json::from_str::<LoanId>("\"abc\"").is_err());
    }

    #[test]
    fn test_id_serializes_as_number() {
        let id = UserId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        assert_eq!(id.to_string(), "7");
        assert_eq!(" 7 ".parse::<UserId>().unwrap(), id);
    }
}
