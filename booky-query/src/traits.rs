//! Traits for cached values and fetch errors.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

/// Marker trait for values that can live in the query cache.
///
/// Cached data is held as a JSON value so that snapshots taken before an
/// optimistic update are exact structural copies. Anything that serializes
/// and deserializes with serde qualifies.
pub trait Cacheable: Serialize + DeserializeOwned + Send + 'static {}

impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Send + 'static {}

/// Error type produced by fetchers.
///
/// Fetch results are shared among every caller waiting on the same key, so
/// the error must be `Clone`. The cache never inspects the error beyond
/// asking whether a retry could help.
pub trait FetchError: Clone + Send + Sync + fmt::Debug + fmt::Display + 'static {
    /// Whether a read that failed with this error may succeed on retry.
    fn is_transient(&self) -> bool {
        false
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from fresh cached data.
    pub hits: u64,
    /// Reads that needed a fetch (started or joined).
    pub misses: u64,
    /// Fetches actually started.
    pub fetches: u64,
    /// Reads that joined a fetch already in flight.
    pub coalesced: u64,
    /// Fetch results dropped because nobody was waiting or the entry moved on.
    pub discarded: u64,
    /// Optimistic updates rolled back after a failed write.
    pub rollbacks: u64,
    /// Entries removed by garbage collection.
    pub evictions: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
