//! Booky Core - Entity Types
//!
//! Pure data structures shared by the query cache, the API client and the
//! CLI. This crate contains ONLY data types and their validation rules.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;

pub use entities::*;
pub use enums::{BorrowDuration, LoanFilter, LoanStatus, Role};
pub use error::{ValidationError, ValidationResult};
pub use identity::{
    AuthorId, BookId, CategoryId, EntityIdType, LoanId, RawId, ReviewId, Timestamp, UserId,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_user() -> User {
        User {
            id: UserId::new(1),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: Some("0800".to_string()),
            role: Role::User,
        }
    }

    #[test]
    fn test_user_patch_merges_present_fields_only() {
        let mut user = make_user();
        user.apply(&UserPatch {
            name: Some("Ada L.".to_string()),
            phone: Some(None),
            ..Default::default()
        });

        assert_eq!(user.name, "Ada L.");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.phone, None);
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_review_rating_bounds() {
        assert!(Review::validate_rating(0).is_err());
        assert_eq!(Review::validate_rating(1), Ok(1));
        assert_eq!(Review::validate_rating(5), Ok(5));
        assert_eq!(
            Review::validate_rating(6),
            Err(ValidationError::InvalidRating { rating: 6 })
        );
    }

    #[test]
    fn test_pending_review_has_no_id() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let review = Review::pending(BookId::new(3), 4, None, now);
        assert!(review.is_pending());
        assert_eq!(review.user.name, "You");
    }

    #[test]
    fn test_loan_is_late() {
        let borrowed_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let loan = Loan {
            id: LoanId::new(1),
            user_id: UserId::new(1),
            book_id: BookId::new(2),
            status: LoanStatus::Borrowed,
            borrowed_at,
            due_at: borrowed_at + BorrowDuration::ThreeDays.as_chrono(),
            returned_at: None,
            book: LoanBook {
                id: BookId::new(2),
                title: "Dune".to_string(),
                cover_url: None,
                author: AuthorRef::unknown(),
            },
        };

        assert!(!loan.is_late(borrowed_at));
        assert!(loan.is_late(borrowed_at + chrono::Duration::days(4)));
    }

    #[test]
    fn test_page_total_pages() {
        let page = Page::<u8> {
            items: vec![],
            total: 41,
            page: 1,
            limit: 20,
        };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());

        let empty = Page::<u8> {
            items: vec![],
            total: 0,
            page: 1,
            limit: 0,
        };
        assert_eq!(empty.total_pages(), 0);
    }

    #[test]
    fn test_book_draft_validation() {
        let mut draft = BookDraft {
            title: "Dune".to_string(),
            author_id: Some(AuthorId::new(1)),
            category_id: Some(CategoryId::new(2)),
            total_copies: 3,
            ..Default::default()
        };
        assert!(draft.validate().is_ok());

        draft.total_copies = 0;
        assert!(draft.validate().is_err());
        draft.total_copies = 1;
        draft.title = "  ".to_string();
        assert_eq!(draft.validate(), Err(ValidationError::required("title")));
    }

    #[test]
    fn test_book_detail_flattens_book_fields() {
        let detail = BookDetail {
            book: Book {
                id: BookId::new(9),
                title: "Emma".to_string(),
                author: AuthorRef {
                    id: Some(AuthorId::new(1)),
                    name: "Austen".to_string(),
                },
                cover_url: None,
                rating: 4.5,
                stock: 2,
                categories: vec![],
                description: None,
            },
            total_copies: 3,
            borrow_count: 10,
            review_count: 1,
            isbn: Some("123".to_string()),
            published_year: Some(1815),
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["title"], "Emma");
        assert_eq!(json["totalCopies"], 3);
        let back: BookDetail = serde_json::from_value(json).unwrap();
        assert_eq!(back, detail);
    }
}
