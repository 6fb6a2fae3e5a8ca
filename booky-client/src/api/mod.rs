//! REST API client for the library server.
//!
//! [`RestClient`] speaks HTTP; [`LibraryApi`] is the seam the store is
//! written against, so tests can swap in an in-memory fake.

mod admin;
mod auth;
mod books;
mod catalog;
mod loans;
mod payload;
mod reviews;
mod transport;

pub use auth::{LoginRequest, ProfileUpdate, RegisterRequest};
pub use books::BookQuery;
pub use catalog::NewAuthor;
pub use payload::{AuthSession, ProfileChange};
pub use reviews::ReviewSubmission;
pub use transport::RestClient;

use async_trait::async_trait;
use booky_core::{
    AdminLoan, AdminOverview, AdminUser, Author, AuthorId, Book, BookDraft, BookId,
    BookWithReviews, BorrowDuration, Category, Loan, LoanFilter, LoanId, Page, ProfileSummary,
    Review, ReviewId, UserReview,
};

use crate::checkout::{CheckoutReceipt, CheckoutRequest};
use crate::error::ApiClientError;
use crate::session::Credentials;

/// Operations of the library API.
///
/// Every call that needs a signed-in user takes the credentials explicitly.
/// Implementations never keep or clear session state themselves.
#[async_trait]
pub trait LibraryApi: Send + Sync + 'static {
    async fn login(&self, request: &LoginRequest) -> Result<AuthSession, ApiClientError>;
    async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, ApiClientError>;
    async fn my_profile(&self, creds: Option<&Credentials>) -> Result<ProfileSummary, ApiClientError>;
    async fn update_profile(
        &self,
        creds: Option<&Credentials>,
        update: &ProfileUpdate,
    ) -> Result<ProfileChange, ApiClientError>;

    async fn list_books(&self, creds: Option<&Credentials>, query: &BookQuery) -> Result<Page<Book>, ApiClientError>;
    async fn book_detail(&self, creds: Option<&Credentials>, id: BookId) -> Result<BookWithReviews, ApiClientError>;
    async fn book_reviews(&self, creds: Option<&Credentials>, id: BookId) -> Result<Vec<Review>, ApiClientError>;
    async fn author_books(&self, creds: Option<&Credentials>, author_id: AuthorId) -> Result<Vec<Book>, ApiClientError>;
    async fn create_book(&self, creds: Option<&Credentials>, draft: &BookDraft) -> Result<Book, ApiClientError>;
    async fn update_book(
        &self,
        creds: Option<&Credentials>,
        id: BookId,
        draft: &BookDraft,
    ) -> Result<Book, ApiClientError>;
    async fn delete_book(&self, creds: Option<&Credentials>, id: BookId) -> Result<(), ApiClientError>;

    async fn categories(&self, creds: Option<&Credentials>) -> Result<Vec<Category>, ApiClientError>;
    async fn create_category(&self, creds: Option<&Credentials>, name: &str) -> Result<Category, ApiClientError>;
    async fn create_author(&self, creds: Option<&Credentials>, author: &NewAuthor) -> Result<Author, ApiClientError>;
    async fn upload_cover(
        &self,
        creds: Option<&Credentials>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiClientError>;

    async fn borrow_book(
        &self,
        creds: Option<&Credentials>,
        book_id: BookId,
        days: BorrowDuration,
    ) -> Result<(), ApiClientError>;
    async fn checkout(
        &self,
        creds: Option<&Credentials>,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt, ApiClientError>;
    async fn my_loans(&self, creds: Option<&Credentials>) -> Result<Vec<Loan>, ApiClientError>;
    async fn return_loan(&self, creds: Option<&Credentials>, loan_id: LoanId) -> Result<(), ApiClientError>;

    async fn submit_review(
        &self,
        creds: Option<&Credentials>,
        submission: &ReviewSubmission,
    ) -> Result<Review, ApiClientError>;
    async fn delete_review(&self, creds: Option<&Credentials>, id: ReviewId) -> Result<(), ApiClientError>;
    async fn my_reviews(
        &self,
        creds: Option<&Credentials>,
        page: u32,
        limit: u32,
    ) -> Result<Page<UserReview>, ApiClientError>;

    async fn admin_overview(&self, creds: Option<&Credentials>) -> Result<AdminOverview, ApiClientError>;
    async fn admin_loans(
        &self,
        creds: Option<&Credentials>,
        page: u32,
        limit: u32,
        filter: LoanFilter,
    ) -> Result<Page<AdminLoan>, ApiClientError>;
    async fn admin_users(
        &self,
        creds: Option<&Credentials>,
        q: Option<&str>,
        page: u32,
    ) -> Result<Page<AdminUser>, ApiClientError>;
    async fn admin_mark_returned(&self, creds: Option<&Credentials>, loan_id: LoanId) -> Result<(), ApiClientError>;
}

#[async_trait]
impl LibraryApi for RestClient {
    async fn login(&self, request: &LoginRequest) -> Result<AuthSession, ApiClientError> {
        RestClient::login(self, request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, ApiClientError> {
        RestClient::register(self, request).await
    }

    async fn my_profile(&self, creds: Option<&Credentials>) -> Result<ProfileSummary, ApiClientError> {
        RestClient::my_profile(self, creds).await
    }

    async fn update_profile(
        &self,
        creds: Option<&Credentials>,
        update: &ProfileUpdate,
    ) -> Result<ProfileChange, ApiClientError> {
        RestClient::update_profile(self, creds, update).await
    }

    async fn list_books(&self, creds: Option<&Credentials>, query: &BookQuery) -> Result<Page<Book>, ApiClientError> {
        RestClient::list_books(self, creds, query).await
    }

    async fn book_detail(&self, creds: Option<&Credentials>, id: BookId) -> Result<BookWithReviews, ApiClientError> {
        RestClient::book_detail(self, creds, id).await
    }

    async fn book_reviews(&self, creds: Option<&Credentials>, id: BookId) -> Result<Vec<Review>, ApiClientError> {
        RestClient::book_reviews(self, creds, id).await
    }

    async fn author_books(&self, creds: Option<&Credentials>, author_id: AuthorId) -> Result<Vec<Book>, ApiClientError> {
        RestClient::author_books(self, creds, author_id).await
    }

    async fn create_book(&self, creds: Option<&Credentials>, draft: &BookDraft) -> Result<Book, ApiClientError> {
        RestClient::create_book(self, creds, draft).await
    }

    async fn update_book(
        &self,
        creds: Option<&Credentials>,
        id: BookId,
        draft: &BookDraft,
    ) -> Result<Book, ApiClientError> {
        RestClient::update_book(self, creds, id, draft).await
    }

    async fn delete_book(&self, creds: Option<&Credentials>, id: BookId) -> Result<(), ApiClientError> {
        RestClient::delete_book(self, creds, id).await
    }

    async fn categories(&self, creds: Option<&Credentials>) -> Result<Vec<Category>, ApiClientError> {
        RestClient::categories(self, creds).await
    }

    async fn create_category(&self, creds: Option<&Credentials>, name: &str) -> Result<Category, ApiClientError> {
        RestClient::create_category(self, creds, name).await
    }

    async fn create_author(&self, creds: Option<&Credentials>, author: &NewAuthor) -> Result<Author, ApiClientError> {
        RestClient::create_author(self, creds, author).await
    }

    async fn upload_cover(
        &self,
        creds: Option<&Credentials>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiClientError> {
        RestClient::upload_cover(self, creds, file_name, bytes).await
    }

    async fn borrow_book(
        &self,
        creds: Option<&Credentials>,
        book_id: BookId,
        days: BorrowDuration,
    ) -> Result<(), ApiClientError> {
        RestClient::borrow_book(self, creds, book_id, days).await
    }

    async fn checkout(
        &self,
        creds: Option<&Credentials>,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt, ApiClientError> {
        RestClient::checkout(self, creds, request).await
    }

    async fn my_loans(&self, creds: Option<&Credentials>) -> Result<Vec<Loan>, ApiClientError> {
        RestClient::my_loans(self, creds).await
    }

    async fn return_loan(&self, creds: Option<&Credentials>, loan_id: LoanId) -> Result<(), ApiClientError> {
        RestClient::return_loan(self, creds, loan_id).await
    }

    async fn submit_review(
        &self,
        creds: Option<&Credentials>,
        submission: &ReviewSubmission,
    ) -> Result<Review, ApiClientError> {
        RestClient::submit_review(self, creds, submission).await
    }

    async fn delete_review(&self, creds: Option<&Credentials>, id: ReviewId) -> Result<(), ApiClientError> {
        RestClient::delete_review(self, creds, id).await
    }

    async fn my_reviews(
        &self,
        creds: Option<&Credentials>,
        page: u32,
        limit: u32,
    ) -> Result<Page<UserReview>, ApiClientError> {
        RestClient::my_reviews(self, creds, page, limit).await
    }

    async fn admin_overview(&self, creds: Option<&Credentials>) -> Result<AdminOverview, ApiClientError> {
        RestClient::admin_overview(self, creds).await
    }

    async fn admin_loans(
        &self,
        creds: Option<&Credentials>,
        page: u32,
        limit: u32,
        filter: LoanFilter,
    ) -> Result<Page<AdminLoan>, ApiClientError> {
        RestClient::admin_loans(self, creds, page, limit, filter).await
    }

    async fn admin_users(
        &self,
        creds: Option<&Credentials>,
        q: Option<&str>,
        page: u32,
    ) -> Result<Page<AdminUser>, ApiClientError> {
        RestClient::admin_users(self, creds, q, page).await
    }

    async fn admin_mark_returned(&self, creds: Option<&Credentials>, loan_id: LoanId) -> Result<(), ApiClientError> {
        RestClient::admin_mark_returned(self, creds, loan_id).await
    }
}
