//! User-facing outcome messages.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::{ApiClientError, ClientError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    /// Error notice carrying the server's message, or `fallback` when the
    /// failure did not come with one.
    pub fn from_error(err: &ClientError, fallback: &str) -> Self {
        let message = match err.api_error() {
            Some(api) => api_message(api, fallback),
            None => err.user_message(),
        };
        Self::new(NotificationLevel::Error, message)
    }

    pub fn from_api_error(err: &ApiClientError, fallback: &str) -> Self {
        Self::new(NotificationLevel::Error, api_message(err, fallback))
    }
}

fn api_message(err: &ApiClientError, fallback: &str) -> String {
    match err {
        ApiClientError::AuthExpired { .. } => "Your session has expired, please sign in again".to_string(),
        ApiClientError::Network(_) | ApiClientError::Timeout => err.user_message(),
        other => other
            .server_message()
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string()),
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionError;

    #[test]
    fn test_server_message_wins_over_fallback() {
        let err = ClientError::Api(ApiClientError::Conflict {
            message: "Book is out of stock".to_string(),
        });
        let note = Notification::from_error(&err, "Checkout failed");
        assert_eq!(note.level, NotificationLevel::Error);
        assert_eq!(note.message, "Book is out of stock");
    }

    #[test]
    fn test_fallback_when_no_server_message() {
        let err = ClientError::Api(ApiClientError::Decode("eof".to_string()));
        assert_eq!(
            Notification::from_error(&err, "Checkout failed").message,
            "Checkout failed"
        );
    }

    #[test]
    fn test_non_api_errors_use_their_own_text() {
        let err = ClientError::Session(SessionError::NotAuthenticated);
        let note = Notification::from_error(&err, "ignored");
        assert_eq!(note.message, "Please sign in first");
        assert_eq!(note.to_string(), "[error] Please sign in first");
    }
}
