//! Borrowing and returning.

use booky_core::{AuthorRef, BookId, BorrowDuration, Loan, LoanId};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::debug;

use super::payload::{array_under, decode, decode_each, unwrap_data, RemoteLoan};
use super::transport::RestClient;
use crate::checkout::{CheckoutReceipt, CheckoutRequest};
use crate::error::ApiClientError;
use crate::session::Credentials;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BorrowRequest {
    book_id: BookId,
    days: BorrowDuration,
}

impl RestClient {
    pub async fn borrow_book(
        &self,
        creds: Option<&Credentials>,
        book_id: BookId,
        days: BorrowDuration,
    ) -> Result<(), ApiClientError> {
        self.post_json("/loans", creds, &BorrowRequest { book_id, days })
            .await?;
        Ok(())
    }

    pub async fn checkout(
        &self,
        creds: Option<&Credentials>,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt, ApiClientError> {
        let body = self.post_json("/loans/checkout", creds, request).await?;
        Ok(decode(unwrap_data(&body), "checkout receipt").unwrap_or_default())
    }

    /// The signed-in user's loans, each with its book's author filled in.
    pub async fn my_loans(&self, creds: Option<&Credentials>) -> Result<Vec<Loan>, ApiClientError> {
        let body = self.get_json::<()>("/loans/my", creds, None).await?;
        let loans = decode_each(
            array_under(unwrap_data(&body), &["loans"]),
            "loan",
            RemoteLoan::into_loan,
        );

        let authors = join_all(loans.iter().map(|loan| self.author_or_unknown(creds, loan.book_id))).await;
        Ok(loans
            .into_iter()
            .zip(authors)
            .map(|(mut loan, author)| {
                loan.book.author = author;
                loan
            })
            .collect())
    }

    pub async fn return_loan(
        &self,
        creds: Option<&Credentials>,
        loan_id: LoanId,
    ) -> Result<(), ApiClientError> {
        self.patch_json(
            &format!("/loans/{}/return", loan_id),
            creds,
            &serde_json::json!({}),
        )
        .await?;
        Ok(())
    }

    /// A failed lookup degrades to "Unknown Author" instead of failing the list.
    pub(crate) async fn author_or_unknown(&self, creds: Option<&Credentials>, book_id: BookId) -> AuthorRef {
        match self.book_author(creds, book_id).await {
            Ok(Some(author)) => author,
            Ok(None) => AuthorRef::unknown(),
            Err(err) => {
                debug!(book_id = %book_id, error = %err, "Author lookup failed");
                AuthorRef::unknown()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booky_core::EntityIdType;

    #[test]
    fn test_borrow_body_uses_numeric_fields() {
        let body = serde_json::to_value(BorrowRequest {
            book_id: BookId::new(12),
            days: BorrowDuration::TenDays,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "bookId": 12, "days": 10 }));
    }
}
