//! The query client: keyed read-through cache with single-flight fetches.
//!
//! All state lives in one map behind a `std::sync::Mutex` that is never held
//! across an `.await`. Each key owns a slot holding its entry, the fetch
//! currently in flight (if any) and the number of mounted subscribers.
//!
//! Fetches run as spawned tasks whose output is shared among every caller
//! that asked for the key while it was loading. The task applies its own
//! result to the slot, but only while it is still the slot's current fetch
//! and somebody still cares about the answer.

use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::{QueryConfig, RetryConfig};
use crate::entry::{decode_value, encode_value, CacheEntry, DataOrigin, QueryState, QueryStatus};
use crate::error::QueryError;
use crate::freshness::{Freshness, QueryResult};
use crate::key::QueryKey;
use crate::traits::{CacheStats, Cacheable, FetchError};

pub(crate) type FetchOutput<E> = Result<Value, QueryError<E>>;
pub(crate) type Fetcher<E> = Arc<dyn Fn() -> BoxFuture<'static, FetchOutput<E>> + Send + Sync>;
type SharedFetch<E> = Shared<BoxFuture<'static, FetchOutput<E>>>;

// ============================================================================
// SLOTS
// ============================================================================

pub(crate) struct InFlight<E> {
    id: u64,
    /// Write epoch at the time the fetch started.
    epoch: u64,
    future: SharedFetch<E>,
    waiters: Arc<AtomicUsize>,
    /// Status to fall back to if the fetch is dropped without a result.
    status_before: QueryStatus,
}

pub(crate) struct Slot<E> {
    pub(crate) entry: CacheEntry<E>,
    pub(crate) inflight: Option<InFlight<E>>,
    pub(crate) observers: usize,
    pub(crate) fetcher: Option<Fetcher<E>>,
    pub(crate) last_used: Instant,
    pub(crate) notify: watch::Sender<u64>,
}

impl<E> Slot<E> {
    pub(crate) fn new(key: QueryKey, now: Instant) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            entry: CacheEntry::idle(key),
            inflight: None,
            observers: 0,
            fetcher: None,
            last_used: now,
            notify,
        }
    }

    /// Detach the in-flight fetch so its result is never applied.
    pub(crate) fn supersede(&mut self) -> bool {
        match self.inflight.take() {
            Some(inflight) => {
                if self.entry.status == QueryStatus::Loading {
                    self.entry.status = inflight.status_before;
                }
                true
            }
            None => false,
        }
    }

    /// The entry as it stands without the in-flight fetch.
    pub(crate) fn settled_entry(&self) -> CacheEntry<E>
    where
        E: Clone,
    {
        let mut entry = self.entry.clone();
        if let Some(inflight) = &self.inflight {
            entry.status = inflight.status_before;
        }
        entry
    }

    /// Wake subscribers.
    pub(crate) fn touch(&self) {
        self.notify.send_modify(|version| *version = version.wrapping_add(1));
    }
}

// ============================================================================
// COUNTERS
// ============================================================================

#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    coalesced: AtomicU64,
    discarded: AtomicU64,
    pub(crate) rollbacks: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn snapshot(&self, entry_count: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: entry_count as u64,
        }
    }
}

// ============================================================================
// INNER STATE
// ============================================================================

pub(crate) type SlotMap<E> = HashMap<QueryKey, Slot<E>>;

pub(crate) struct Inner<E> {
    pub(crate) config: QueryConfig,
    slots: Mutex<SlotMap<E>>,
    /// Bumped each time a mutation's write succeeds.
    pub(crate) write_epoch: AtomicU64,
    next_fetch_id: AtomicU64,
    pub(crate) counters: Counters,
}

impl<E> Inner<E> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SlotMap<E>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: FetchError> Inner<E> {
    /// Apply a finished fetch to its slot, if it is still wanted.
    fn settle(&self, key: &QueryKey, fetch_id: u64, waiters: &AtomicUsize, result: &FetchOutput<E>) {
        let now = Instant::now();
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(key) else {
            Counters::add(&self.counters.discarded, 1);
            debug!(key = %key, fetch_id, "Fetch result discarded, entry removed");
            return;
        };
        if !slot.inflight.as_ref().is_some_and(|f| f.id == fetch_id) {
            Counters::add(&self.counters.discarded, 1);
            debug!(key = %key, fetch_id, "Fetch result discarded, entry moved on");
            return;
        }
        let Some(inflight) = slot.inflight.take() else {
            return;
        };
        slot.last_used = now;

        if waiters.load(Ordering::SeqCst) == 0 && slot.observers == 0 {
            slot.entry.status = inflight.status_before;
            slot.touch();
            Counters::add(&self.counters.discarded, 1);
            debug!(key = %key, fetch_id, "Fetch result discarded, nobody waiting");
            return;
        }

        match result {
            Ok(value) => {
                slot.entry
                    .write_data(value.clone(), DataOrigin::Fetched, now, self.config.stale_time);
                debug!(key = %key, fetch_id, "Fetch succeeded");
            }
            Err(err) => {
                slot.entry.write_error(err.clone());
                debug!(key = %key, fetch_id, error = %err, "Fetch failed");
            }
        }
        slot.touch();
    }
}

// ============================================================================
// PENDING FETCHES
// ============================================================================

/// Keeps a fetch's waiter count raised for as long as a caller awaits it.
struct WaitGuard(Arc<AtomicUsize>);

impl WaitGuard {
    fn enter(waiters: &Arc<AtomicUsize>) -> Self {
        waiters.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(waiters))
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A caller's handle on an in-flight fetch. Created under the map lock.
pub(crate) struct Pending<E> {
    future: SharedFetch<E>,
    _guard: WaitGuard,
}

impl<E: FetchError> Pending<E> {
    fn join(inflight: &InFlight<E>) -> Self {
        Self {
            future: inflight.future.clone(),
            _guard: WaitGuard::enter(&inflight.waiters),
        }
    }

    pub(crate) async fn wait(self) -> FetchOutput<E> {
        let Self { future, _guard } = self;
        future.await
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// Shared query cache. Cloning is cheap; clones share state.
pub struct QueryClient<E> {
    pub(crate) inner: Arc<Inner<E>>,
}

impl<E> Clone for QueryClient<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A handle that does not keep the cache alive.
///
/// Fetchers stored in the cache hold one of these when they need to reach
/// back into it, so the cache never owns a reference to itself.
pub struct WeakQueryClient<E> {
    inner: Weak<Inner<E>>,
}

impl<E> Clone for WeakQueryClient<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<E> WeakQueryClient<E> {
    /// The cache, if it still exists.
    pub fn upgrade(&self) -> Option<QueryClient<E>> {
        self.inner.upgrade().map(|inner| QueryClient { inner })
    }
}

impl<E> QueryClient<E> {
    pub fn downgrade(&self) -> WeakQueryClient<E> {
        WeakQueryClient {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<E: FetchError> Default for QueryClient<E> {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl<E: FetchError> QueryClient<E> {
    pub fn new(config: QueryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                slots: Mutex::new(HashMap::new()),
                write_epoch: AtomicU64::new(0),
                next_fetch_id: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    /// Read `key`, fetching it when the cached data is not fresh.
    pub async fn query<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<QueryResult<T>, QueryError<E>>
    where
        T: Cacheable,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.query_with(key, Freshness::Default, fetcher).await
    }

    /// Read `key` with an explicit freshness requirement.
    ///
    /// When the fetch fails the error is returned and the entry keeps its
    /// previous data next to the error (see [`QueryClient::state`]).
    pub async fn query_with<T, F, Fut>(
        &self,
        key: QueryKey,
        freshness: Freshness,
        fetcher: F,
    ) -> Result<QueryResult<T>, QueryError<E>>
    where
        T: Cacheable,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let fetcher = erase_fetcher(key.clone(), fetcher);
        let read = self.read(key.clone(), freshness, fetcher).await?;
        let value = decode_value(&key, read.value())?;
        Ok(read.map(|_| value))
    }

    /// Always fetch `key`, joining a fetch that is already in flight.
    pub async fn refetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<QueryResult<T>, QueryError<E>>
    where
        T: Cacheable,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.query_with(key, Freshness::Refetch, fetcher).await
    }

    pub(crate) async fn read(
        &self,
        key: QueryKey,
        freshness: Freshness,
        fetcher: Fetcher<E>,
    ) -> Result<QueryResult<Value>, QueryError<E>> {
        let max_age = freshness.resolve(self.inner.config.stale_time);
        let pending = {
            let now = Instant::now();
            let mut slots = self.inner.lock();
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key.clone(), now));
            slot.last_used = now;

            if let Some(data) = servable(&slot.entry, now, max_age) {
                Counters::add(&self.inner.counters.hits, 1);
                trace!(key = %key, "Cache hit");
                return Ok(QueryResult::from_cache(
                    data.clone(),
                    slot.entry.updated_at,
                    slot.entry.origin,
                ));
            }

            Counters::add(&self.inner.counters.misses, 1);
            match &slot.inflight {
                Some(inflight) => {
                    Counters::add(&self.inner.counters.coalesced, 1);
                    trace!(key = %key, "Joining in-flight fetch");
                    Pending::join(inflight)
                }
                None => {
                    let epoch = self.inner.write_epoch.load(Ordering::SeqCst);
                    self.start_fetch(slot, fetcher, epoch)
                }
            }
        };

        let value = pending.wait().await?;
        Ok(QueryResult::from_fetch(value, Some(chrono::Utc::now())))
    }

    /// Spawn the fetch for `slot` and register it as in flight.
    fn start_fetch(&self, slot: &mut Slot<E>, fetcher: Fetcher<E>, epoch: u64) -> Pending<E> {
        let fetch_id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed) + 1;
        let key = slot.entry.key.clone();
        let waiters = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn(run_fetch(
            Arc::clone(&self.inner),
            key.clone(),
            fetch_id,
            fetcher,
            Arc::clone(&waiters),
        ));
        let join_key = key.clone();
        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(err) => Err(QueryError::Aborted {
                    key: join_key,
                    reason: err.to_string(),
                }),
            }
        }
        .boxed()
        .shared();

        let inflight = InFlight {
            id: fetch_id,
            epoch,
            future,
            waiters,
            status_before: slot.entry.status,
        };
        let pending = Pending::join(&inflight);
        slot.inflight = Some(inflight);
        slot.entry.status = QueryStatus::Loading;
        slot.touch();

        Counters::add(&self.inner.counters.fetches, 1);
        debug!(key = %key, fetch_id, epoch, "Fetch started");
        pending
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Snapshot of the entry for `key`.
    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry<E>> {
        self.inner.lock().get(key).map(|slot| slot.entry.clone())
    }

    /// Typed view of `key`: data, error and status together.
    pub fn state<T: Cacheable>(&self, key: &QueryKey) -> Result<Option<QueryState<T, E>>, QueryError<E>> {
        let now = Instant::now();
        match self.entry(key) {
            Some(entry) => entry.state(now).map(Some),
            None => Ok(None),
        }
    }

    /// Cached data for `key`, fresh or not.
    pub fn get_query_data<T: Cacheable>(&self, key: &QueryKey) -> Result<Option<T>, QueryError<E>> {
        match self.entry(key) {
            Some(entry) => entry.decode(),
            None => Ok(None),
        }
    }

    /// Write data for `key` directly, as if it had just been fetched.
    ///
    /// A fetch in flight for the key is detached; its result is dropped.
    pub fn set_query_data<T: Cacheable>(&self, key: &QueryKey, value: &T) -> Result<(), QueryError<E>> {
        let value = encode_value(key, value)?;
        let now = Instant::now();
        let mut slots = self.inner.lock();
        let slot = slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone(), now));
        slot.supersede();
        slot.entry
            .write_data(value, DataOrigin::Manual, now, self.inner.config.stale_time);
        slot.last_used = now;
        slot.touch();
        trace!(key = %key, "Query data set");
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let entry_count = self.inner.lock().len();
        self.inner.counters.snapshot(entry_count)
    }

    // ------------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------------

    /// Mark every entry under `prefix` stale and refetch the subscribed ones.
    ///
    /// Data is kept while the refetch runs. Returns once every refetch has
    /// settled, with the number of entries matched. Refetch failures are
    /// recorded on their entries for subscribers to see.
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let (matched, refetches) = self.mark(prefix, true);
        if !refetches.is_empty() {
            let results = join_all(refetches.into_iter().map(Pending::wait)).await;
            let failed = results.iter().filter(|r| r.is_err()).count();
            debug!(prefix = %prefix, refetched = results.len(), failed, "Invalidation refetches settled");
        }
        matched
    }

    /// Mark every entry under `prefix` stale without refetching anything.
    pub fn mark_stale(&self, prefix: &QueryKey) -> usize {
        self.mark(prefix, false).0
    }

    fn mark(&self, prefix: &QueryKey, refetch: bool) -> (usize, Vec<Pending<E>>) {
        let epoch = self.inner.write_epoch.load(Ordering::SeqCst);
        let mut refetches = Vec::new();
        let mut matched = 0;

        let mut slots = self.inner.lock();
        for slot in slots.values_mut() {
            if !slot.entry.key.starts_with(prefix) {
                continue;
            }
            matched += 1;

            // A fetch started after the latest write already sees it.
            let current_fetch = slot.inflight.as_ref().filter(|f| f.epoch >= epoch);
            if let Some(inflight) = current_fetch {
                if refetch && slot.observers > 0 {
                    refetches.push(Pending::join(inflight));
                }
                continue;
            }

            if slot.supersede() {
                debug!(key = %slot.entry.key, "In-flight fetch superseded by invalidation");
            }
            slot.entry.mark_stale();
            slot.touch();

            if refetch && slot.observers > 0 {
                if let Some(fetcher) = slot.fetcher.clone() {
                    refetches.push(self.start_fetch(slot, fetcher, epoch));
                }
            }
        }

        debug!(prefix = %prefix, matched, refetching = refetches.len(), "Invalidated");
        (matched, refetches)
    }

    // ------------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------------

    /// Remove every entry under `prefix`.
    ///
    /// Subscribed entries are reset to idle instead of being dropped, so
    /// their subscriptions stay attached.
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let mut removed = 0;
        let mut slots = self.inner.lock();
        slots.retain(|key, slot| {
            if !key.starts_with(prefix) {
                return true;
            }
            removed += 1;
            if slot.observers == 0 {
                return false;
            }
            slot.supersede();
            slot.entry = CacheEntry::idle(key.clone());
            slot.touch();
            true
        });
        debug!(prefix = %prefix, removed, "Removed entries");
        removed
    }

    /// Remove every entry.
    pub fn clear(&self) -> usize {
        self.remove(&QueryKey::from_segments(Vec::new()))
    }

    /// Evict entries nobody has used for `gc_time`.
    ///
    /// Subscribed entries and entries with a fetch in flight are kept.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.inner.config.gc_time;
        let mut slots = self.inner.lock();
        let before = slots.len();
        slots.retain(|_, slot| {
            slot.observers > 0
                || slot.inflight.is_some()
                || now.saturating_duration_since(slot.last_used) < gc_time
        });
        let evicted = before - slots.len();
        if evicted > 0 {
            Counters::add(&self.inner.counters.evictions, evicted as u64);
            debug!(evicted, remaining = slots.len(), "Garbage collected idle entries");
        }
        evicted
    }
}

/// Cached data that satisfies `max_age`, if any. `None` age accepts anything.
fn servable<E>(entry: &CacheEntry<E>, now: Instant, max_age: Option<Duration>) -> Option<&Value> {
    let ok = match max_age {
        Some(age) => entry.is_fresh(now, age),
        None => true,
    };
    if ok {
        entry.data.as_ref()
    } else {
        None
    }
}

/// Type-erase a fetcher so slots can hold and re-run it.
pub(crate) fn erase_fetcher<T, E, F, Fut>(key: QueryKey, fetcher: F) -> Fetcher<E>
where
    T: Cacheable,
    E: FetchError,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Arc::new(move || {
        let key = key.clone();
        let fut = fetcher();
        async move {
            let value = fut.await.map_err(QueryError::Fetch)?;
            encode_value(&key, &value)
        }
        .boxed()
    })
}

async fn run_fetch<E: FetchError>(
    inner: Arc<Inner<E>>,
    key: QueryKey,
    fetch_id: u64,
    fetcher: Fetcher<E>,
    waiters: Arc<AtomicUsize>,
) -> FetchOutput<E> {
    let result = AssertUnwindSafe(fetch_with_retry(&key, &fetcher, &inner.config.retry))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            Err(QueryError::Aborted {
                key: key.clone(),
                reason: "fetcher panicked".to_string(),
            })
        });
    inner.settle(&key, fetch_id, &waiters, &result);
    result
}

async fn fetch_with_retry<E: FetchError>(
    key: &QueryKey,
    fetcher: &Fetcher<E>,
    retry: &RetryConfig,
) -> FetchOutput<E> {
    let mut attempt = 0;
    loop {
        match fetcher().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < retry.max_retries => {
                let delay = retry.delay_for(attempt);
                attempt += 1;
                warn!(
                    key = %key,
                    attempt,
                    max_retries = retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient fetch failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
