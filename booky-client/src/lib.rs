//! Booky Client - REST API, Session and Cart
//!
//! Everything the storefront needs besides rendering:
//!
//! - [`api`]: typed calls against the library REST API behind the
//!   [`LibraryApi`] trait, with lenient decoding of its payloads
//! - [`store::LibraryStore`]: reads through the query cache, writes with
//!   optimistic updates and invalidation, session and cart state
//! - [`config`], [`persistence`], [`telemetry`]: ambient plumbing for the
//!   `booky` command-line binary

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod keys;
pub mod notifications;
pub mod persistence;
pub mod session;
pub mod store;
pub mod telemetry;

pub use api::{
    AuthSession, BookQuery, LibraryApi, LoginRequest, NewAuthor, ProfileChange, ProfileUpdate,
    RegisterRequest, RestClient, ReviewSubmission,
};
pub use cart::{Cart, CartError, CartItem};
pub use checkout::{Agreements, CheckoutError, CheckoutPlan, CheckoutReceipt, CheckoutRequest};
pub use config::{ClientConfig, ConfigError, LogFormat};
pub use error::{ApiClientError, ClientError, ClientResult};
pub use notifications::{Notification, NotificationLevel};
pub use persistence::{PersistedState, PersistenceError};
pub use session::{Credentials, Session, SessionError, SessionManager};
pub use store::LibraryStore;
