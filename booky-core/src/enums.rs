//! Enum types for Booky entities

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Lifecycle of a loan as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Borrowed,
    Returned,
    Overdue,
}

impl LoanStatus {
    /// A loan still holds a copy until it is returned.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Borrowed | Self::Overdue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Borrowed => "BORROWED",
            Self::Returned => "RETURNED",
            Self::Overdue => "OVERDUE",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BORROWED" => Ok(Self::Borrowed),
            "RETURNED" => Ok(Self::Returned),
            "OVERDUE" | "LATE" => Ok(Self::Overdue),
            other => Err(ValidationError::InvalidValue {
                field: "status".to_string(),
                reason: format!("unknown loan status '{}'", other),
            }),
        }
    }
}

/// Account role. Admin routes require `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("USER"),
            Self::Admin => f.write_str("ADMIN"),
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other => Err(ValidationError::InvalidValue {
                field: "role".to_string(),
                reason: format!("unknown role '{}'", other),
            }),
        }
    }
}

/// Borrow duration offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BorrowDuration {
    #[default]
    ThreeDays,
    FiveDays,
    TenDays,
}

impl BorrowDuration {
    pub const ALL: [BorrowDuration; 3] = [Self::ThreeDays, Self::FiveDays, Self::TenDays];

    pub fn days(&self) -> u32 {
        match self {
            Self::ThreeDays => 3,
            Self::FiveDays => 5,
            Self::TenDays => 10,
        }
    }

    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.days()))
    }
}

impl TryFrom<u32> for BorrowDuration {
    type Error = ValidationError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            3 => Ok(Self::ThreeDays),
            5 => Ok(Self::FiveDays),
            10 => Ok(Self::TenDays),
            _ => Err(ValidationError::InvalidBorrowDuration { days }),
        }
    }
}

impl From<BorrowDuration> for u32 {
    fn from(duration: BorrowDuration) -> Self {
        duration.days()
    }
}

impl fmt::Display for BorrowDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} days", self.days())
    }
}

/// Tabs of the admin loan dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanFilter {
    #[default]
    All,
    Active,
    Returned,
    Overdue,
}

impl LoanFilter {
    /// Status query parameter sent to `/admin/loans`. `Overdue` uses its own endpoint.
    pub fn status_param(&self) -> Option<LoanStatus> {
        match self {
            Self::All | Self::Overdue => None,
            Self::Active => Some(LoanStatus::Borrowed),
            Self::Returned => Some(LoanStatus::Returned),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Returned => "returned",
            Self::Overdue => "overdue",
        }
    }
}

impl FromStr for LoanFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "returned" => Ok(Self::Returned),
            "overdue" => Ok(Self::Overdue),
            other => Err(ValidationError::InvalidValue {
                field: "filter".to_string(),
                reason: format!("unknown loan filter '{}'", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&LoanStatus::Borrowed).unwrap(),
            "\"BORROWED\""
        );
        let parsed: LoanStatus = serde_json::from_str("\"RETURNED\"").unwrap();
        assert_eq!(parsed, LoanStatus::Returned);
        assert!(LoanStatus::Overdue.is_active());
        assert!(!LoanStatus::Returned.is_active());
    }

    #[test]
    fn test_borrow_duration_only_accepts_offered_days() {
        assert_eq!(BorrowDuration::try_from(5).unwrap(), BorrowDuration::FiveDays);
        assert!(BorrowDuration::try_from(7).is_err());
        let parsed: BorrowDuration = serde_json::from_str("10").unwrap();
        assert_eq!(parsed.days(), 10);
        assert!(serde_json::from_str::<BorrowDuration>("4").is_err());
    }

    #[test]
    fn test_loan_filter_status_param() {
        assert_eq!(LoanFilter::All.status_param(), None);
        assert_eq!(LoanFilter::Active.status_param(), Some(LoanStatus::Borrowed));
        assert_eq!(LoanFilter::Returned.status_param(), Some(LoanStatus::Returned));
        assert_eq!("Overdue".parse::<LoanFilter>().unwrap(), LoanFilter::Overdue);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
