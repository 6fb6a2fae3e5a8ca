//! Error types for the Booky client.

use booky_core::ValidationError;
use booky_query::{FetchError, MutationError, QueryError};
use reqwest::StatusCode;

use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::persistence::PersistenceError;
use crate::session::SessionError;

/// Errors produced by the REST client.
///
/// Fetch results are shared between every caller waiting on one query key,
/// so this error is `Clone` and keeps only the parts worth showing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Session expired: {message}")]
    AuthExpired { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid request: {message}")]
    Validation { message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl ApiClientError {
    /// Classify a non-success HTTP status. `message` is the server's own
    /// `message` field when the body carried one.
    pub fn from_status(status: StatusCode, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });

        match status.as_u16() {
            401 => Self::AuthExpired { message },
            403 => Self::Forbidden { message },
            404 => Self::NotFound { message },
            409 => Self::Conflict { message },
            429 => Self::Server {
                status: status.as_u16(),
                message,
            },
            code if status.is_server_error() => Self::Server {
                status: code,
                message,
            },
            _ => Self::Validation { message },
        }
    }

    /// The message the server sent back, if the failure came from the server.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::AuthExpired { message }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Validation { message }
            | Self::Server { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Text suitable for showing to a person.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Could not reach the library server".to_string(),
            Self::Timeout => "The library server took too long to respond".to_string(),
            Self::Decode(_) => "The library server sent an unexpected response".to_string(),
            Self::Config(reason) => format!("Client misconfigured: {}", reason),
            other => other
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }
}

impl FetchError for ApiClientError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::Server { .. })
    }
}

impl From<reqwest::Error> for ApiClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::Config(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status, None)
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<QueryError<ApiClientError>> for ApiClientError {
    fn from(err: QueryError<ApiClientError>) -> Self {
        match err {
            QueryError::Fetch(inner) => inner,
            other => Self::Decode(other.to_string()),
        }
    }
}

impl From<MutationError<ApiClientError>> for ApiClientError {
    fn from(err: MutationError<ApiClientError>) -> Self {
        match err {
            MutationError::Write(inner) => inner,
            other => Self::Decode(other.to_string()),
        }
    }
}

/// Top-level error for the store and the CLI.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiClientError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ClientError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            Self::Checkout(CheckoutError::Api(err)) => err.user_message(),
            other => other.to_string(),
        }
    }

    pub fn api_error(&self) -> Option<&ApiClientError> {
        match self {
            Self::Api(err) | Self::Checkout(CheckoutError::Api(err)) => Some(err),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let msg = || Some("nope".to_string());
        assert!(matches!(
            ApiClientError::from_status(StatusCode::UNAUTHORIZED, msg()),
            ApiClientError::AuthExpired { .. }
        ));
        assert!(matches!(
            ApiClientError::from_status(StatusCode::FORBIDDEN, msg()),
            ApiClientError::Forbidden { .. }
        ));
        assert!(matches!(
            ApiClientError::from_status(StatusCode::NOT_FOUND, msg()),
            ApiClientError::NotFound { .. }
        ));
        assert!(matches!(
            ApiClientError::from_status(StatusCode::CONFLICT, msg()),
            ApiClientError::Conflict { .. }
        ));
        assert!(matches!(
            ApiClientError::from_status(StatusCode::UNPROCESSABLE_ENTITY, msg()),
            ApiClientError::Validation { .. }
        ));
        assert_eq!(
            ApiClientError::from_status(StatusCode::BAD_GATEWAY, msg()),
            ApiClientError::Server {
                status: 502,
                message: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_missing_message_falls_back_to_reason() {
        let err = ApiClientError::from_status(StatusCode::NOT_FOUND, Some("  ".to_string()));
        assert_eq!(err.server_message(), Some("Not Found"));
    }

    #[test]
    fn test_only_network_failures_are_transient() {
        assert!(ApiClientError::Timeout.is_transient());
        assert!(ApiClientError::Network("reset".to_string()).is_transient());
        assert!(ApiClientError::from_status(StatusCode::SERVICE_UNAVAILABLE, None).is_transient());
        assert!(!ApiClientError::from_status(StatusCode::UNAUTHORIZED, None).is_transient());
        assert!(!ApiClientError::Decode("bad".to_string()).is_transient());
    }

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = ApiClientError::from_status(StatusCode::CONFLICT, Some("Book out of stock".to_string()));
        assert_eq!(err.user_message(), "Book out of stock");
        assert_eq!(
            ApiClientError::Timeout.user_message(),
            "The library server took too long to respond"
        );
    }

    #[test]
    fn test_cache_errors_unwrap_to_api_errors() {
        let err: ApiClientError = QueryError::Fetch(ApiClientError::Timeout).into();
        assert_eq!(err, ApiClientError::Timeout);
        let err: ApiClientError = MutationError::Write(ApiClientError::Timeout).into();
        assert_eq!(err, ApiClientError::Timeout);
    }
}
