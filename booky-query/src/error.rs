//! Error types for cache reads and mutations.
//!
//! The cache never classifies or swallows the caller's own errors: a failed
//! fetcher comes back as `QueryError::Fetch(e)` and a failed write as
//! `MutationError::Write(e)`, holding exactly what the caller's future
//! returned.

use crate::key::QueryKey;
use crate::traits::FetchError;
use thiserror::Error;

/// Errors returned by cache reads.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError<E> {
    /// The fetcher failed; the payload is its error, unchanged.
    #[error("{0}")]
    Fetch(E),

    #[error("Cached value for {key} does not match the requested type: {reason}")]
    Decode { key: QueryKey, reason: String },

    #[error("Value for {key} could not be encoded: {reason}")]
    Encode { key: QueryKey, reason: String },

    /// The fetch task panicked or the runtime shut down under it.
    #[error("Fetch for {key} was aborted: {reason}")]
    Aborted { key: QueryKey, reason: String },
}

impl<E> QueryError<E> {
    pub fn fetch_error(&self) -> Option<&E> {
        match self {
            Self::Fetch(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_fetch_error(self) -> Option<E> {
        match self {
            Self::Fetch(err) => Some(err),
            _ => None,
        }
    }
}

impl<E: FetchError> QueryError<E> {
    /// Only fetcher errors that declare themselves transient are retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch(err) if err.is_transient())
    }
}

/// Errors returned by [`QueryClient::mutate`](crate::QueryClient::mutate).
///
/// By the time a caller sees either variant, every optimistic update made
/// for the mutation has been rolled back.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError<E> {
    /// The write failed; the payload is its error, unchanged.
    #[error("{0}")]
    Write(E),

    /// An optimistic update could not be applied, so the write never ran.
    #[error("Optimistic update of {key} failed: {reason}")]
    Optimistic { key: QueryKey, reason: String },
}

impl<E> MutationError<E> {
    pub fn write_error(&self) -> Option<&E> {
        match self {
            Self::Write(err) => Some(err),
            Self::Optimistic { .. } => None,
        }
    }

    pub fn into_write_error(self) -> Option<E> {
        match self {
            Self::Write(err) => Some(err),
            Self::Optimistic { .. } => None,
        }
    }
}
