//! Background garbage collection of idle cache entries.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::client::QueryClient;
use crate::traits::FetchError;

/// Periodically evict entries that nobody has used for `gc_time`.
///
/// Runs until `shutdown` turns `true` (or its sender is dropped) and returns
/// the total number of entries evicted.
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(gc_task(client.clone(), Duration::from_secs(60), shutdown_rx));
/// // ...
/// let _ = shutdown_tx.send(true);
/// let evicted = handle.await?;
/// ```
pub async fn gc_task<E: FetchError>(
    client: QueryClient<E>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        period_secs = period.as_secs(),
        gc_time_secs = client.config().gc_time.as_secs(),
        "Query cache GC started"
    );

    let mut evicted: u64 = 0;
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                evicted += client.collect_garbage() as u64;
            }
        }
    }

    tracing::info!(evicted, "Query cache GC stopped");
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::query_key;

    #[derive(Debug, Clone)]
    struct NoError;

    impl std::fmt::Display for NoError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("no error")
        }
    }

    impl FetchError for NoError {}

    #[tokio::test(start_paused = true)]
    async fn test_gc_task_evicts_and_stops() {
        let client: QueryClient<NoError> =
            QueryClient::new(QueryConfig::default().with_gc_time(Duration::from_secs(60)));
        client.set_query_data(&query_key!["categories"], &1u32).unwrap();
        client.set_query_data(&query_key!["profile"], &2u32).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(gc_task(client.clone(), Duration::from_secs(10), shutdown_rx));

        tokio::time::sleep(Duration::from_secs(75)).await;
        assert_eq!(client.stats().entry_count, 0);

        shutdown_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), 2);
    }
}
