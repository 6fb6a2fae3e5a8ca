//! Cache entries and their status machine.
//!
//! ```text
//! idle -> loading -> success | error
//! success | error -> stale        (invalidate)
//! stale -> loading                (refetch)
//! ```
//!
//! `loading` is only ever entered by the single in-flight fetch of a key.
//! Data survives every transition except an explicit removal, so a failed
//! refresh leaves the previous value visible next to the error.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::QueryError;
use crate::key::QueryKey;
use crate::traits::Cacheable;

/// Status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// Created (e.g. by a subscription) but never fetched.
    Idle,
    /// A fetch is in flight. Previous data, if any, is still readable.
    Loading,
    Success,
    /// The last fetch failed. Previous data, if any, is still readable.
    Error,
    /// Invalidated; served to nobody as fresh until a refetch completes.
    Stale,
}

/// Where the current data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataOrigin {
    Fetched,
    /// Written with `set_query_data`.
    Manual,
    /// Speculative value written by a mutation that has not settled.
    Optimistic,
}

/// One cached result set. Owned by the cache; callers get clones.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<E> {
    pub(crate) key: QueryKey,
    pub(crate) data: Option<Value>,
    pub(crate) error: Option<QueryError<E>>,
    pub(crate) status: QueryStatus,
    pub(crate) origin: DataOrigin,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) stale_after: Option<Instant>,
}

impl<E> CacheEntry<E> {
    pub(crate) fn idle(key: QueryKey) -> Self {
        Self {
            key,
            data: None,
            error: None,
            status: QueryStatus::Idle,
            origin: DataOrigin::Fetched,
            updated_at: None,
            fetched_at: None,
            stale_after: None,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&QueryError<E>> {
        self.error.as_ref()
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    /// Wall-clock time of the last data write.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Instant after which the data no longer counts as fresh.
    pub fn stale_after(&self) -> Option<Instant> {
        self.stale_after
    }

    pub fn is_optimistic(&self) -> bool {
        self.data.is_some() && self.origin == DataOrigin::Optimistic
    }

    /// Whether the data may be served without fetching, given a maximum age.
    pub(crate) fn is_fresh(&self, now: Instant, max_age: Duration) -> bool {
        if self.status != QueryStatus::Success || self.data.is_none() {
            return false;
        }
        match self.fetched_at {
            Some(at) => now.saturating_duration_since(at) < max_age,
            None => false,
        }
    }

    /// Stale either by invalidation or by age.
    pub fn is_stale(&self, now: Instant) -> bool {
        match self.status {
            QueryStatus::Stale | QueryStatus::Error | QueryStatus::Idle => true,
            QueryStatus::Loading | QueryStatus::Success => {
                self.stale_after.map_or(true, |deadline| now >= deadline)
            }
        }
    }

    pub(crate) fn write_data(
        &mut self,
        value: Value,
        origin: DataOrigin,
        now: Instant,
        stale_time: Duration,
    ) {
        self.data = Some(value);
        self.error = None;
        self.status = QueryStatus::Success;
        self.origin = origin;
        self.updated_at = Some(Utc::now());
        self.fetched_at = Some(now);
        self.stale_after = Some(now + stale_time);
    }

    pub(crate) fn write_error(&mut self, error: QueryError<E>) {
        self.error = Some(error);
        self.status = QueryStatus::Error;
    }

    /// Success and error entries become stale. Returns whether anything changed.
    pub(crate) fn mark_stale(&mut self) -> bool {
        match self.status {
            QueryStatus::Success | QueryStatus::Error => {
                self.status = QueryStatus::Stale;
                true
            }
            QueryStatus::Idle | QueryStatus::Loading | QueryStatus::Stale => false,
        }
    }
}

impl<E: Clone> CacheEntry<E> {
    /// Decode the data into the caller's type.
    pub fn decode<T: Cacheable>(&self) -> Result<Option<T>, QueryError<E>> {
        match &self.data {
            Some(value) => decode_value(&self.key, value).map(Some),
            None => Ok(None),
        }
    }

    /// Typed view of this entry.
    pub fn state<T: Cacheable>(&self, now: Instant) -> Result<QueryState<T, E>, QueryError<E>> {
        Ok(QueryState {
            data: self.decode()?,
            error: self.error.clone(),
            status: self.status,
            origin: self.origin,
            updated_at: self.updated_at,
            is_stale: self.is_stale(now),
        })
    }
}

pub(crate) fn decode_value<T: Cacheable, E>(
    key: &QueryKey,
    value: &Value,
) -> Result<T, QueryError<E>> {
    <T as serde::Deserialize>::deserialize(value).map_err(|e| QueryError::Decode {
        key: key.clone(),
        reason: e.to_string(),
    })
}

pub(crate) fn encode_value<T: Cacheable, E>(
    key: &QueryKey,
    value: &T,
) -> Result<Value, QueryError<E>> {
    serde_json::to_value(value).map_err(|e| QueryError::Encode {
        key: key.clone(),
        reason: e.to_string(),
    })
}

/// Typed snapshot of an entry, as a mounted view would render it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T, E> {
    pub data: Option<T>,
    pub error: Option<QueryError<E>>,
    pub status: QueryStatus,
    pub origin: DataOrigin,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_stale: bool,
}

impl<T, E> QueryState<T, E> {
    /// Data to display next to an error indicator.
    pub fn has_stale_data_with_error(&self) -> bool {
        self.data.is_some() && self.error.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}
