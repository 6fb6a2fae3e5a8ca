//! Turning cart items into a borrow request.

use booky_core::{BookId, BorrowDuration, LoanId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::error::ApiClientError;

/// The two confirmations a borrower ticks before checking out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Agreements {
    /// "I agree to return the book(s) before the due date."
    pub return_on_time: bool,
    /// "I accept the library borrowing policy."
    pub borrowing_policy: bool,
}

impl Agreements {
    pub fn accepted() -> Self {
        Self {
            return_on_time: true,
            borrowing_policy: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckoutError {
    #[error("Nothing selected for checkout")]
    Empty,
    #[error("You must agree to {0} before borrowing")]
    AgreementMissing(&'static str),
    #[error(transparent)]
    Api(#[from] ApiClientError),
}

/// A checkout the borrower is looking at: what, for how long, until when.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutPlan {
    items: Vec<CartItem>,
    duration: BorrowDuration,
    borrow_date: Timestamp,
    due_date: Timestamp,
}

impl CheckoutPlan {
    pub fn new(
        items: Vec<CartItem>,
        duration: BorrowDuration,
        now: Timestamp,
    ) -> Result<Self, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::Empty);
        }
        Ok(Self {
            items,
            duration,
            borrow_date: now,
            due_date: now + duration.as_chrono(),
        })
    }

    /// Pick a different duration; the due date follows.
    pub fn with_duration(mut self, duration: BorrowDuration) -> Self {
        self.duration = duration;
        self.due_date = self.borrow_date + duration.as_chrono();
        self
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn duration(&self) -> BorrowDuration {
        self.duration
    }

    pub fn borrow_date(&self) -> Timestamp {
        self.borrow_date
    }

    pub fn due_date(&self) -> Timestamp {
        self.due_date
    }

    pub fn book_ids(&self) -> Vec<BookId> {
        self.items.iter().map(|i| i.book_id).collect()
    }

    /// Build the request body once both agreements are ticked.
    pub fn confirm(&self, agreements: Agreements) -> Result<CheckoutRequest, CheckoutError> {
        if !agreements.return_on_time {
            return Err(CheckoutError::AgreementMissing("return the books on time"));
        }
        if !agreements.borrowing_policy {
            return Err(CheckoutError::AgreementMissing("the borrowing policy"));
        }
        Ok(CheckoutRequest {
            items: self
                .items
                .iter()
                .map(|i| CheckoutLine {
                    book_id: i.book_id,
                    qty: i.qty,
                })
                .collect(),
            days: self.duration,
        })
    }
}

/// Body of `POST /loans/checkout`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLine>,
    pub days: BorrowDuration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    pub book_id: BookId,
    pub qty: u32,
}

/// What the server reports back after a checkout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    #[serde(default)]
    pub loan_ids: Vec<LoanId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use booky_core::EntityIdType;
    use chrono::{TimeZone, Utc};

    fn items() -> Vec<CartItem> {
        vec![CartItem {
            book_id: BookId::new(4),
            title: "Dune".to_string(),
            cover_url: None,
            qty: 2,
        }]
    }

    #[test]
    fn test_due_date_follows_duration() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let plan = CheckoutPlan::new(items(), BorrowDuration::ThreeDays, now).unwrap();
        assert_eq!(plan.due_date(), Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap());

        let plan = plan.with_duration(BorrowDuration::TenDays);
        assert_eq!(plan.due_date(), Utc.with_ymd_and_hms(2024, 3, 11, 10, 0, 0).unwrap());
        assert_eq!(plan.borrow_date(), now);
    }

    #[test]
    fn test_empty_checkout_rejected() {
        assert_eq!(
            CheckoutPlan::new(vec![], BorrowDuration::FiveDays, Utc::now()),
            Err(CheckoutError::Empty)
        );
    }

    #[test]
    fn test_both_agreements_required() {
        let plan = CheckoutPlan::new(items(), BorrowDuration::FiveDays, Utc::now()).unwrap();
        let only_one = Agreements {
            return_on_time: true,
            borrowing_policy: false,
        };
        assert!(matches!(
            plan.confirm(only_one),
            Err(CheckoutError::AgreementMissing(_))
        ));
        assert!(plan.confirm(Agreements::default()).is_err());

        let request = plan.confirm(Agreements::accepted()).unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "items": [{ "bookId": 4, "qty": 2 }], "days": 5 })
        );
    }
}
