//! Core entity structures

use crate::{
    AuthorId, BookId, CategoryId, LoanId, LoanStatus, ReviewId, Role, Timestamp, UserId,
    ValidationError, ValidationResult,
};
use serde::{Deserialize, Serialize};

/// Lightweight author reference embedded in books and loans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    pub id: Option<AuthorId>,
    pub name: String,
}

impl AuthorRef {
    pub const UNKNOWN_NAME: &'static str = "Unknown Author";

    pub fn unknown() -> Self {
        Self {
            id: None,
            name: Self::UNKNOWN_NAME.to_string(),
        }
    }
}

/// Category reference attached to a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

/// Reviewer reference. A review written by the current user before the
/// server confirmed it has no id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: Option<UserId>,
    pub name: String,
}

/// A catalogue entry as shown in listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: AuthorRef,
    pub cover_url: Option<String>,
    pub rating: f64,
    /// Copies currently available to borrow.
    pub stock: u32,
    pub categories: Vec<CategoryRef>,
    pub description: Option<String>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.stock > 0
    }
}

/// Full book record from the detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub total_copies: u32,
    pub borrow_count: u32,
    pub review_count: u32,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
}

/// Book detail together with the reviews embedded in the same response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookWithReviews {
    pub book: BookDetail,
    pub reviews: Vec<Review>,
}

/// A star rating with an optional comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Option<ReviewId>,
    pub book_id: BookId,
    pub user: UserRef,
    /// 1..=5
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: Timestamp,
}

impl Review {
    pub const MIN_RATING: u8 = 1;
    pub const MAX_RATING: u8 = 5;

    /// Check a star rating is within 1..=5.
    pub fn validate_rating(rating: u8) -> ValidationResult<u8> {
        if (Self::MIN_RATING..=Self::MAX_RATING).contains(&rating) {
            Ok(rating)
        } else {
            Err(ValidationError::InvalidRating { rating })
        }
    }

    /// A review by the current user that the server has not confirmed yet.
    pub fn pending(
        book_id: BookId,
        rating: u8,
        comment: Option<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: None,
            book_id,
            user: UserRef {
                id: None,
                name: "You".to_string(),
            },
            rating,
            comment,
            created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }
}

/// Book summary embedded in a reviewer's own review list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedBook {
    pub id: BookId,
    pub title: String,
    pub author: AuthorRef,
}

/// One entry of `/me/reviews`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReview {
    #[serde(flatten)]
    pub review: Review,
    pub book: ReviewedBook,
}

/// Book summary embedded in a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanBook {
    pub id: BookId,
    pub title: String,
    pub cover_url: Option<String>,
    pub author: AuthorRef,
}

/// A borrowed copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub status: LoanStatus,
    pub borrowed_at: Timestamp,
    pub due_at: Timestamp,
    pub returned_at: Option<Timestamp>,
    pub book: LoanBook,
}

impl Loan {
    /// Past due and still not returned, whatever status the server reports.
    pub fn is_late(&self, now: Timestamp) -> bool {
        self.status.is_active() && now > self.due_at
    }
}

/// Contact details of a borrower, shown on admin loan lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContact {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// A loan as listed on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLoan {
    #[serde(flatten)]
    pub loan: Loan,
    pub user: Option<UserContact>,
}

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Merge the fields present in `patch`.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(id) = patch.id {
            self.id = id;
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
    }
}

/// Partial user update. `phone: Some(None)` clears the phone number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub id: Option<UserId>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub role: Option<Role>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.role.is_none()
    }
}

/// Profile block of `/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanStats {
    pub borrowed: u32,
    pub late: u32,
    pub returned: u32,
    pub total: u32,
}

/// Everything `/me` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub profile: Profile,
    pub loan_stats: LoanStats,
    pub reviews_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 {
            return if self.total == 0 { 0 } else { 1 };
        }
        self.total.div_ceil(self.limit)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueTotals {
    pub users: u32,
    pub books: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTotals {
    pub active: u32,
    pub overdue: u32,
}

/// Row of the most-borrowed ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopBorrowed {
    pub id: BookId,
    pub title: String,
    pub borrow_count: u32,
    pub rating: f64,
    pub available_copies: u32,
    pub total_copies: u32,
    pub author: Option<AuthorRef>,
    pub category: Option<CategoryRef>,
    pub cover_url: Option<String>,
}

/// Admin dashboard overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub totals: CatalogueTotals,
    pub loans: LoanTotals,
    pub top_borrowed: Vec<TopBorrowed>,
    pub generated_at: Option<String>,
}

/// Account row on the admin user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: Option<Timestamp>,
}

/// Payload for creating or editing a book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDraft {
    pub title: String,
    pub author_id: Option<AuthorId>,
    pub category_id: Option<CategoryId>,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub total_copies: u32,
    pub cover_image: Option<String>,
}

impl BookDraft {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::required("title"));
        }
        if self.author_id.is_none() {
            return Err(ValidationError::required("authorId"));
        }
        if self.category_id.is_none() {
            return Err(ValidationError::required("categoryId"));
        }
        if self.total_copies == 0 {
            return Err(ValidationError::InvalidValue {
                field: "totalCopies".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
