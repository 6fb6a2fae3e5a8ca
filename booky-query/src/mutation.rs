//! Optimistic mutations with exact rollback.
//!
//! `mutate` runs in three steps:
//!
//! 1. Apply every optimistic update under the map lock, keeping a copy of
//!    each touched entry as it was before.
//! 2. Await the write. Writes are never retried.
//! 3. On success, advance the write epoch and invalidate the declared
//!    prefixes. On failure, put every copied entry back before the error
//!    is returned.

use futures_util::future::join_all;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::Ordering;
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::{Counters, QueryClient, Slot, SlotMap};
use crate::entry::{CacheEntry, DataOrigin};
use crate::error::MutationError;
use crate::key::QueryKey;
use crate::traits::{Cacheable, FetchError};

/// Identifies one `mutate` call in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationId(Uuid);

impl MutationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type ApplyFn = Box<dyn FnOnce(Option<&Value>) -> Result<Option<Value>, String> + Send>;

/// A speculative change to one cache entry.
pub struct Optimistic {
    key: QueryKey,
    apply: ApplyFn,
}

impl Optimistic {
    /// Compute the speculative value from the current one.
    ///
    /// `update` receives the cached data (if any) and returns the value to
    /// show while the write is pending. Returning `None` leaves the entry
    /// untouched.
    pub fn new<T, F>(key: QueryKey, update: F) -> Self
    where
        T: Cacheable,
        F: FnOnce(Option<T>) -> Option<T> + Send + 'static,
    {
        Self {
            key,
            apply: Box::new(move |current| {
                let current = current
                    .map(<T as serde::Deserialize>::deserialize)
                    .transpose()
                    .map_err(|e| e.to_string())?;
                update(current)
                    .map(|next| serde_json::to_value(&next))
                    .transpose()
                    .map_err(|e| e.to_string())
            }),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl fmt::Debug for Optimistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Optimistic").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Cache effects of a mutation.
#[derive(Debug, Default)]
pub struct MutationOptions {
    pub optimistic: Vec<Optimistic>,
    pub invalidates: Vec<QueryKey>,
}

impl MutationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optimistic(mut self, update: Optimistic) -> Self {
        self.optimistic.push(update);
        self
    }

    /// Invalidate `prefix` once the write has succeeded.
    pub fn invalidates(mut self, prefix: QueryKey) -> Self {
        self.invalidates.push(prefix);
        self
    }
}

/// An entry as it was before an optimistic update. `None` when the key had
/// no entry at all.
struct Snapshot<E> {
    key: QueryKey,
    prior: Option<CacheEntry<E>>,
}

impl<E: FetchError> QueryClient<E> {
    /// Run `write` with optimistic updates and follow-up invalidation.
    ///
    /// The write's own error comes back unchanged as
    /// [`MutationError::Write`], and only after every optimistic update has
    /// been rolled back.
    pub async fn mutate<R, WE, W>(&self, write: W, options: MutationOptions) -> Result<R, MutationError<WE>>
    where
        W: Future<Output = Result<R, WE>>,
    {
        let id = MutationId::new();
        let span = info_span!("mutation", id = %id);
        self.run_mutation(write, options).instrument(span).await
    }

    async fn run_mutation<R, WE, W>(&self, write: W, options: MutationOptions) -> Result<R, MutationError<WE>>
    where
        W: Future<Output = Result<R, WE>>,
    {
        let MutationOptions { optimistic, invalidates } = options;
        let snapshots = self.apply_optimistic(optimistic)?;
        if !snapshots.is_empty() {
            debug!(entries = snapshots.len(), "Optimistic updates applied");
        }

        match write.await {
            Ok(value) => {
                let epoch = self.inner.write_epoch.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(epoch, invalidates = invalidates.len(), "Write succeeded");
                join_all(invalidates.iter().map(|prefix| self.invalidate(prefix))).await;
                Ok(value)
            }
            Err(err) => {
                let restored = snapshots.len();
                self.rollback(snapshots);
                if restored > 0 {
                    warn!(restored, "Write failed, optimistic updates rolled back");
                } else {
                    debug!("Write failed");
                }
                Err(MutationError::Write(err))
            }
        }
    }

    fn apply_optimistic<WE>(&self, updates: Vec<Optimistic>) -> Result<Vec<Snapshot<E>>, MutationError<WE>> {
        let now = Instant::now();
        let stale_time = self.inner.config.stale_time;
        let mut snapshots = Vec::with_capacity(updates.len());
        let mut slots = self.inner.lock();

        for Optimistic { key, apply } in updates {
            let prior = slots.get(&key).map(Slot::settled_entry);
            let current = prior.as_ref().and_then(|entry| entry.data.as_ref());
            let next = match apply(current) {
                Ok(next) => next,
                Err(reason) => {
                    restore(&mut slots, snapshots);
                    return Err(MutationError::Optimistic { key, reason });
                }
            };
            let Some(next) = next else {
                continue;
            };

            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key.clone(), now));
            slot.supersede();
            slot.entry.write_data(next, DataOrigin::Optimistic, now, stale_time);
            slot.last_used = now;
            slot.touch();
            snapshots.push(Snapshot { key, prior });
        }
        Ok(snapshots)
    }

    fn rollback(&self, snapshots: Vec<Snapshot<E>>) {
        if snapshots.is_empty() {
            return;
        }
        let count = snapshots.len() as u64;
        let mut slots = self.inner.lock();
        restore(&mut slots, snapshots);
        Counters::add(&self.inner.counters.rollbacks, count);
    }
}

/// Put snapshots back, newest first, so repeated keys end at their oldest copy.
fn restore<E>(slots: &mut SlotMap<E>, snapshots: Vec<Snapshot<E>>) {
    let now = Instant::now();
    for Snapshot { key, prior } in snapshots.into_iter().rev() {
        match prior {
            Some(entry) => {
                let slot = slots
                    .entry(key.clone())
                    .or_insert_with(|| Slot::new(key.clone(), now));
                slot.supersede();
                slot.entry = entry;
                slot.touch();
            }
            None => {
                let observed = slots.get(&key).is_some_and(|slot| slot.observers > 0);
                if observed {
                    if let Some(slot) = slots.get_mut(&key) {
                        slot.supersede();
                        slot.entry = CacheEntry::idle(key.clone());
                        slot.touch();
                    }
                } else {
                    slots.remove(&key);
                }
            }
        }
        debug!(key = %key, "Entry restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueryConfig, RetryConfig};
    use crate::entry::QueryStatus;
    use crate::query_key;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::AtomicU32;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq)]
    struct ApiError(String);

    impl fmt::Display for ApiError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl FetchError for ApiError {}

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Loan {
        id: u32,
        status: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Review {
        id: Option<u32>,
        star: u8,
        comment: String,
    }

    fn client() -> QueryClient<ApiError> {
        QueryClient::new(QueryConfig::default().with_retry(RetryConfig::none()))
    }

    fn prepend_review(review: Review) -> Optimistic {
        Optimistic::new(query_key!["book-reviews", 1], move |current: Option<Vec<Review>>| {
            current.map(|mut reviews| {
                reviews.insert(0, review);
                reviews
            })
        })
    }

    fn pending_review() -> Review {
        Review {
            id: None,
            star: 5,
            comment: "Great".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_restores_exact_snapshot() {
        let client = client();
        let key = query_key!["book-reviews", 1];
        let existing = vec![Review {
            id: Some(4),
            star: 3,
            comment: "Fine".to_string(),
        }];
        client.set_query_data(&key, &existing).unwrap();
        let before = client.entry(&key).unwrap();

        let result: Result<(), _> = client
            .mutate(
                async { Err(ApiError("network down".to_string())) },
                MutationOptions::new().optimistic(prepend_review(pending_review())),
            )
            .await;

        assert_eq!(result.unwrap_err(), MutationError::Write(ApiError("network down".to_string())));
        assert_eq!(client.entry(&key).unwrap(), before);
        assert_eq!(client.stats().rollbacks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_review_list_restored_after_failure() {
        let client = client();
        let key = query_key!["book-reviews", 1];
        client.set_query_data(&key, &Vec::<Review>::new()).unwrap();

        let (release, gate) = oneshot::channel::<()>();
        let mutation = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .mutate(
                        async move {
                            let _ = gate.await;
                            Err::<(), _>(ApiError("500".to_string()))
                        },
                        MutationOptions::new()
                            .optimistic(prepend_review(pending_review()))
                            .invalidates(query_key!["book-reviews", 1]),
                    )
                    .await
            })
        };
        tokio::task::yield_now().await;

        let during: Vec<Review> = client.get_query_data(&key).unwrap().unwrap();
        assert_eq!(during, vec![pending_review()]);
        assert!(client.entry(&key).unwrap().is_optimistic());

        let _ = release.send(());
        let result = mutation.await.unwrap();

        assert_eq!(result.unwrap_err(), MutationError::Write(ApiError("500".to_string())));
        assert_eq!(client.get_query_data::<Vec<Review>>(&key).unwrap(), Some(vec![]));
        assert_eq!(client.entry(&key).unwrap().status(), QueryStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_removes_entries_created_optimistically() {
        let client = client();
        let key = query_key!["profile"];
        let update = Optimistic::new(key.clone(), |_: Option<String>| Some("optimistic".to_string()));

        let result: Result<(), _> = client
            .mutate(async { Err(ApiError("409".to_string())) }, MutationOptions::new().optimistic(update))
            .await;

        assert!(result.is_err());
        assert!(client.entry(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_key_restores_oldest_copy() {
        let client = client();
        let key = query_key!["cart"];
        client.set_query_data(&key, &1u32).unwrap();
        let before = client.entry(&key).unwrap();

        let bump = |key: &QueryKey| Optimistic::new(key.clone(), |n: Option<u32>| n.map(|n| n + 1));
        let result: Result<(), _> = client
            .mutate(
                async { Err(ApiError("boom".to_string())) },
                MutationOptions::new().optimistic(bump(&key)).optimistic(bump(&key)),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(client.entry(&key).unwrap(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_decode_failure_skips_write() {
        let client = client();
        let key = query_key!["book-reviews", 1];
        client.set_query_data(&key, &"not a list".to_string()).unwrap();
        let writes = Arc::new(AtomicU32::new(0));
        let counter = writes.clone();

        let result = client
            .mutate(
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ApiError>(())
                },
                MutationOptions::new().optimistic(prepend_review(pending_review())),
            )
            .await;

        assert!(matches!(result, Err(MutationError::Optimistic { .. })));
        assert_eq!(writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_waits_for_write() {
        let client = client();
        let key = query_key!["loans"];
        let server = Arc::new(Mutex::new(vec![Loan {
            id: 1,
            status: "BORROWED".to_string(),
        }]));

        let fetch_server = server.clone();
        let loans = client.subscribe::<Vec<Loan>, _, _>(key.clone(), move || {
            let snapshot = fetch_server.lock().unwrap().clone();
            async move { Ok(snapshot) }
        });
        loans.fetch().await.unwrap();

        let write_server = server.clone();
        let fetches_before = client.stats().fetches;
        let write = async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            write_server.lock().unwrap()[0].status = "RETURNED".to_string();
            Ok::<_, ApiError>(())
        };
        client
            .mutate(write, MutationOptions::new().invalidates(query_key!["loans"]))
            .await
            .unwrap();

        assert_eq!(client.stats().fetches, fetches_before + 1);
        let state = loans.state().unwrap().unwrap();
        assert_eq!(state.status, QueryStatus::Success);
        assert_eq!(
            state.data,
            Some(vec![Loan {
                id: 1,
                status: "RETURNED".to_string()
            }])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_after_write_supersedes_older_fetch() {
        let client = client();
        let key = query_key!["loans"];
        let server = Arc::new(Mutex::new("BORROWED".to_string()));

        let fetch_server = server.clone();
        let loans = client.subscribe::<String, _, _>(key.clone(), move || {
            let snapshot = fetch_server.lock().unwrap().clone();
            async move {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                Ok(snapshot)
            }
        });

        let early = {
            let client = client.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let server = Arc::new(Mutex::new("BORROWED".to_string()));
                client
                    .query(key, move || {
                        let snapshot = server.lock().unwrap().clone();
                        async move {
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                            Ok::<_, ApiError>(snapshot)
                        }
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(client.entry(&key).unwrap().status(), QueryStatus::Loading);

        let write_server = server.clone();
        let write = async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            *write_server.lock().unwrap() = "RETURNED".to_string();
            Ok::<_, ApiError>(())
        };
        client
            .mutate(write, MutationOptions::new().invalidates(key.clone()))
            .await
            .unwrap();

        assert_eq!(early.await.unwrap().unwrap().into_value(), "BORROWED");
        assert_eq!(loans.state().unwrap().unwrap().data, Some("RETURNED".to_string()));
        assert_eq!(client.stats().discarded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinvalidation_joins_inflight_refetch() {
        let client = client();
        let key = query_key!["loans"];
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let loans = client.subscribe::<u32, _, _>(key.clone(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                Ok(n)
            }
        });
        loans.fetch().await.unwrap();

        let (first, second) = tokio::join!(client.invalidate(&key), client.invalidate(&key));
        assert_eq!((first, second), (1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(loans.state().unwrap().unwrap().status, QueryStatus::Success);
    }
}
