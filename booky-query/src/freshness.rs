//! Freshness requirements for cache reads.
//!
//! A read states how old the data it receives may be. The default accepts
//! anything younger than the configured stale time, which is the
//! stale-while-revalidate behaviour every screen uses.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::entry::DataOrigin;

/// Freshness requirement for a cache read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Serve cached data younger than the client's `stale_time`.
    #[default]
    Default,

    /// Serve cached data younger than the given age.
    MaxAge(Duration),

    /// Serve any cached data, however old or invalidated. Fetch only when
    /// the key has never produced data.
    AnyCached,

    /// Always go to the source. A fetch already in flight for the key is
    /// joined rather than duplicated.
    Refetch,
}

impl Freshness {
    pub fn max_age(max_age: Duration) -> Self {
        Self::MaxAge(max_age)
    }

    /// Effective maximum age, given the client's stale time.
    ///
    /// `None` means any age is acceptable.
    pub(crate) fn resolve(self, stale_time: Duration) -> Option<Duration> {
        match self {
            Self::Default => Some(stale_time),
            Self::MaxAge(age) => Some(age),
            Self::AnyCached => None,
            Self::Refetch => Some(Duration::ZERO),
        }
    }
}

/// Result of a cache read, carrying where the value came from.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    value: T,
    updated_at: Option<DateTime<Utc>>,
    origin: DataOrigin,
    was_cache_hit: bool,
}

impl<T> QueryResult<T> {
    pub(crate) fn from_cache(value: T, updated_at: Option<DateTime<Utc>>, origin: DataOrigin) -> Self {
        Self {
            value,
            updated_at,
            origin,
            was_cache_hit: true,
        }
    }

    pub(crate) fn from_fetch(value: T, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value,
            updated_at,
            origin: DataOrigin::Fetched,
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    /// True when the value came from the cache without waiting on a fetch.
    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    /// Time since the value was written to the cache.
    pub fn staleness(&self) -> Duration {
        self.updated_at
            .and_then(|at| (Utc::now() - at).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Map the value while keeping the metadata.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> QueryResult<U> {
        QueryResult {
            value: f(self.value),
            updated_at: self.updated_at,
            origin: self.origin,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for QueryResult<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
