//! Mounted observers of a query key.
//!
//! A [`Subscription`] is what a view holds while it is on screen. It keeps
//! its key alive across garbage collection, registers the fetcher used for
//! refetches after invalidation, and wakes up whenever the entry changes.

use std::future::Future;
use std::marker::PhantomData;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::client::{erase_fetcher, Fetcher, QueryClient, Slot};
use crate::entry::{decode_value, QueryState};
use crate::error::QueryError;
use crate::freshness::{Freshness, QueryResult};
use crate::key::QueryKey;
use crate::traits::{Cacheable, FetchError};

/// An observer of one query key. Dropping it unmounts the observer.
pub struct Subscription<T, E> {
    client: QueryClient<E>,
    key: QueryKey,
    fetcher: Fetcher<E>,
    changes: watch::Receiver<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<E: FetchError> QueryClient<E> {
    /// Mount an observer on `key`.
    ///
    /// Nothing is fetched until the subscription asks for data or the key is
    /// invalidated. The most recent subscriber's fetcher is the one used for
    /// refetches.
    pub fn subscribe<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Subscription<T, E>
    where
        T: Cacheable,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let fetcher = erase_fetcher(key.clone(), fetcher);
        let changes = {
            let now = Instant::now();
            let mut slots = self.inner.lock();
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key.clone(), now));
            slot.observers += 1;
            slot.fetcher = Some(fetcher.clone());
            slot.last_used = now;
            debug!(key = %key, observers = slot.observers, "Subscribed");
            slot.notify.subscribe()
        };

        Subscription {
            client: self.clone(),
            key,
            fetcher,
            changes,
            _marker: PhantomData,
        }
    }

    /// Number of mounted subscriptions on `key`.
    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.inner.lock().get(key).map_or(0, |slot| slot.observers)
    }
}

impl<T: Cacheable, E: FetchError> Subscription<T, E> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current state of the entry, without fetching.
    pub fn state(&self) -> Result<Option<QueryState<T, E>>, QueryError<E>> {
        self.client.state(&self.key)
    }

    /// Read through the cache with the subscription's fetcher.
    pub async fn fetch(&self) -> Result<QueryResult<T>, QueryError<E>> {
        self.fetch_with(Freshness::Default).await
    }

    pub async fn fetch_with(&self, freshness: Freshness) -> Result<QueryResult<T>, QueryError<E>> {
        let read = self
            .client
            .read(self.key.clone(), freshness, self.fetcher.clone())
            .await?;
        let value = decode_value(&self.key, read.value())?;
        Ok(read.map(|_| value))
    }

    /// Wait for the entry to change. Returns `false` once the cache is gone.
    pub async fn changed(&mut self) -> bool {
        self.changes.changed().await.is_ok()
    }
}

impl<T, E> Drop for Subscription<T, E> {
    fn drop(&mut self) {
        let mut slots = self.client.inner.lock();
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.observers = slot.observers.saturating_sub(1);
            slot.last_used = Instant::now();
            debug!(key = %self.key, observers = slot.observers, "Unsubscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueryConfig, RetryConfig};
    use crate::entry::QueryStatus;
    use crate::query_key;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Offline;

    impl std::fmt::Display for Offline {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("offline")
        }
    }

    impl FetchError for Offline {}

    fn client() -> QueryClient<Offline> {
        QueryClient::new(QueryConfig::default().with_retry(RetryConfig::none()))
    }

    fn versioned(calls: Arc<AtomicU32>) -> impl Fn() -> std::future::Ready<Result<u32, Offline>> + Send + Sync {
        move || std::future::ready(Ok(calls.fetch_add(1, Ordering::SeqCst) + 1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_refetches_subscribed_keys_only() {
        let client = client();
        let loans_calls = Arc::new(AtomicU32::new(0));
        let reviews_calls = Arc::new(AtomicU32::new(0));

        let loans = client.subscribe::<u32, _, _>(query_key!["loans"], versioned(loans_calls.clone()));
        assert_eq!(loans.fetch().await.unwrap().into_value(), 1);

        let reviews_key = query_key!["loans", "reviews"];
        client
            .query(reviews_key.clone(), versioned(reviews_calls.clone()))
            .await
            .unwrap();

        let matched = client.invalidate(&query_key!["loans"]).await;
        assert_eq!(matched, 2);
        assert_eq!(loans_calls.load(Ordering::SeqCst), 2);
        assert_eq!(reviews_calls.load(Ordering::SeqCst), 1);

        let state = loans.state().unwrap().unwrap();
        assert_eq!(state.status, QueryStatus::Success);
        assert_eq!(state.data, Some(2));
        assert_eq!(client.entry(&reviews_key).unwrap().status(), QueryStatus::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_wakes_on_update() {
        let client = client();
        let key = query_key!["profile"];
        let mut sub = client.subscribe::<u32, _, _>(key.clone(), || std::future::ready(Ok(1)));

        client.set_query_data(&key, &5u32).unwrap();
        assert!(sub.changed().await);
        assert_eq!(sub.state().unwrap().unwrap().data, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_unmounts_and_allows_collection() {
        let client: QueryClient<Offline> =
            QueryClient::new(QueryConfig::default().with_gc_time(Duration::from_secs(60)));
        let key = query_key!["categories"];
        let sub = client.subscribe::<u32, _, _>(key.clone(), || std::future::ready(Ok(1)));
        sub.fetch().await.unwrap();
        assert_eq!(client.observer_count(&key), 1);

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(client.collect_garbage(), 0);

        drop(sub);
        assert_eq!(client.observer_count(&key), 0);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(client.collect_garbage(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_keeps_subscribed_entries_attached() {
        let client = client();
        let key = query_key!["loans"];
        let sub = client.subscribe::<u32, _, _>(key.clone(), || std::future::ready(Ok(9)));
        sub.fetch().await.unwrap();

        assert_eq!(client.clear(), 1);
        let state = sub.state().unwrap().unwrap();
        assert_eq!(state.status, QueryStatus::Idle);
        assert_eq!(state.data, None);
        assert_eq!(sub.fetch().await.unwrap().into_value(), 9);
    }
}
