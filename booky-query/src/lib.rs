//! Booky Query - Client-side Query/Mutation Cache
//!
//! A keyed read-through cache for server resources:
//!
//! - Concurrent reads of one key share a single fetch.
//! - Reads serve cached data while it is younger than `stale_time`.
//! - Invalidation marks entries stale by key prefix and refetches the ones
//!   with mounted subscribers, keeping the old data visible meanwhile.
//! - Mutations may update the cache optimistically; a failed write restores
//!   every touched entry exactly as it was.
//!
//! ```ignore
//! let client: QueryClient<ApiClientError> = QueryClient::default();
//! let loans = client.query(query_key!["loans"], move || api.my_loans()).await?;
//!
//! client
//!     .mutate(
//!         api.return_loan(loan_id),
//!         MutationOptions::new().invalidates(query_key!["loans"]),
//!     )
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod freshness;
pub mod gc;
pub mod key;
pub mod mutation;
pub mod subscription;
pub mod traits;

pub use client::{QueryClient, WeakQueryClient};
pub use config::{QueryConfig, RetryConfig};
pub use entry::{CacheEntry, DataOrigin, QueryState, QueryStatus};
pub use error::{MutationError, QueryError};
pub use freshness::{Freshness, QueryResult};
pub use gc::gc_task;
pub use key::{KeySegment, QueryKey};
pub use mutation::{MutationId, MutationOptions, Optimistic};
pub use subscription::Subscription;
pub use traits::{CacheStats, Cacheable, FetchError};
