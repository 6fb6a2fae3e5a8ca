//! Error types for Booky domain values

use thiserror::Error;

/// Validation errors raised before a request leaves the client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Rating must be between 1 and 5, got {rating}")]
    InvalidRating { rating: u8 },

    #[error("Borrow duration must be 3, 5 or 10 days, got {days}")]
    InvalidBorrowDuration { days: u32 },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        Self::RequiredFieldMissing {
            field: field.into(),
        }
    }
}

/// Result type for domain validation.
pub type ValidationResult<T> = Result<T, ValidationError>;
