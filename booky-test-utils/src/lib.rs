//! Booky Test Utilities
//!
//! Shared test infrastructure for the Booky workspace:
//! - [`FakeLibraryApi`], an in-memory library server for store tests
//! - Proptest generators for entity types
//! - Fixtures for common scenarios
//! - Assertions on client errors

mod fake_api;

pub use fake_api::{FakeLibraryApi, DEFAULT_PASSWORD};

pub use booky_client::{
    ApiClientError, Cart, CartItem, ClientError, ClientResult, Credentials, LibraryStore,
    PersistedState, Session,
};
pub use booky_core::{
    AuthorId, AuthorRef, Book, BookDetail, BookId, BorrowDuration, CategoryId, CategoryRef,
    EntityIdType, Loan, LoanBook, LoanId, LoanStatus, Review, ReviewId, Role, Timestamp, User,
    UserId, UserRef,
};

use booky_query::{QueryConfig, RetryConfig};

/// A store over `api` with retries off, so injected failures surface on the
/// first attempt.
pub fn store_with(api: FakeLibraryApi, state: PersistedState) -> LibraryStore<FakeLibraryApi> {
    LibraryStore::new(api, QueryConfig::default().with_retry(RetryConfig::none()), state)
}

/// A store over a seeded library with `user` signed in.
pub fn signed_in_store(user: User) -> LibraryStore<FakeLibraryApi> {
    let api = FakeLibraryApi::seeded();
    let credentials = api.token_for(user.id);
    store_with(
        api,
        PersistedState {
            session: Some(Session { credentials, user }),
            cart: Cart::new(),
        },
    )
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Booky entity types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_book_id() -> impl Strategy<Value = BookId> {
        (1i64..10_000).prop_map(BookId::new)
    }

    /// Book ids from a small pool, so collisions are common.
    pub fn arb_small_book_id() -> impl Strategy<Value = BookId> {
        (1i64..6).prop_map(BookId::new)
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(chrono::Utc::now)
        })
    }

    pub fn arb_borrow_duration() -> impl Strategy<Value = BorrowDuration> {
        prop_oneof![
            Just(BorrowDuration::ThreeDays),
            Just(BorrowDuration::FiveDays),
            Just(BorrowDuration::TenDays),
        ]
    }

    pub fn arb_loan_status() -> impl Strategy<Value = LoanStatus> {
        prop_oneof![
            Just(LoanStatus::Borrowed),
            Just(LoanStatus::Returned),
            Just(LoanStatus::Overdue),
        ]
    }

    pub fn arb_rating() -> impl Strategy<Value = u8> {
        Review::MIN_RATING..=Review::MAX_RATING
    }

    pub fn arb_cart_item() -> impl Strategy<Value = CartItem> {
        (arb_small_book_id(), 1u32..4, "[A-Z][a-z]{2,10}").prop_map(|(book_id, qty, title)| CartItem {
            book_id,
            title,
            cover_url: None,
            qty,
        })
    }

    pub fn arb_user() -> impl Strategy<Value = User> {
        (1i64..1000, "[a-z]{3,8}", prop::bool::ANY).prop_map(|(id, name, admin)| User {
            id: UserId::new(id),
            email: format!("{}@example.com", name),
            name,
            phone: None,
            role: if admin { Role::Admin } else { Role::User },
        })
    }

    pub fn arb_loan() -> impl Strategy<Value = Loan> {
        (1i64..1000, arb_book_id(), arb_loan_status(), arb_timestamp(), arb_borrow_duration()).prop_map(
            |(id, book_id, status, borrowed_at, duration)| {
                fixtures::loan(LoanId::new(id), fixtures::reader().id, book_id, status, borrowed_at, duration)
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built entities. The seeded [`FakeLibraryApi`] holds exactly these.

    use super::*;

    pub const AUTHOR_ID: i64 = 1;
    pub const CATEGORY_ID: i64 = 1;

    /// A regular borrower.
    pub fn reader() -> User {
        User {
            id: UserId::new(1),
            name: "Rita Reader".to_string(),
            email: "rita@example.com".to_string(),
            phone: Some("555-0100".to_string()),
            role: Role::User,
        }
    }

    pub fn admin() -> User {
        User {
            id: UserId::new(2),
            name: "Ada Admin".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            role: Role::Admin,
        }
    }

    pub fn author() -> booky_core::Author {
        booky_core::Author {
            id: AuthorId::new(AUTHOR_ID),
            name: "Ursula K. Le Guin".to_string(),
            bio: "Novelist".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn category() -> booky_core::Category {
        booky_core::Category {
            id: CategoryId::new(CATEGORY_ID),
            name: "Fiction".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn book(id: i64, title: &str, stock: u32) -> Book {
        Book {
            id: BookId::new(id),
            title: title.to_string(),
            author: AuthorRef {
                id: Some(AuthorId::new(AUTHOR_ID)),
                name: author().name,
            },
            cover_url: None,
            rating: 0.0,
            stock,
            categories: vec![CategoryRef {
                id: CategoryId::new(CATEGORY_ID),
                name: category().name,
            }],
            description: Some(format!("About {}", title)),
        }
    }

    pub fn book_detail(id: i64, title: &str, stock: u32) -> BookDetail {
        BookDetail {
            book: book(id, title, stock),
            total_copies: stock.max(1),
            borrow_count: 0,
            review_count: 0,
            isbn: None,
            published_year: Some(1969),
        }
    }

    /// Three books; the last one has no copies left.
    pub fn catalogue() -> Vec<BookDetail> {
        vec![
            book_detail(10, "The Left Hand of Darkness", 3),
            book_detail(11, "The Dispossessed", 1),
            book_detail(12, "The Lathe of Heaven", 0),
        ]
    }

    pub fn loan(
        id: LoanId,
        user_id: UserId,
        book_id: BookId,
        status: LoanStatus,
        borrowed_at: Timestamp,
        duration: BorrowDuration,
    ) -> Loan {
        Loan {
            id,
            user_id,
            book_id,
            status,
            borrowed_at,
            due_at: borrowed_at + duration.as_chrono(),
            returned_at: (status == LoanStatus::Returned).then_some(borrowed_at),
            book: LoanBook {
                id: book_id,
                title: format!("Book {}", book_id),
                cover_url: None,
                author: AuthorRef::unknown(),
            },
        }
    }

    pub fn review(id: i64, book_id: BookId, user: &User, rating: u8) -> Review {
        Review {
            id: Some(ReviewId::new(id)),
            book_id,
            user: UserRef {
                id: Some(user.id),
                name: user.name.clone(),
            },
            rating,
            comment: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn cart_item(book: &Book, qty: u32) -> CartItem {
        CartItem::from_book(book, qty)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on store results.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &ClientResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// The call failed with an API error matching `expected`.
    #[track_caller]
    pub fn assert_api_error<T: std::fmt::Debug>(result: &ClientResult<T>, expected: fn(&ApiClientError) -> bool) {
        match result {
            Err(err) => match err.api_error() {
                Some(api) if expected(api) => {}
                other => panic!("Unexpected API error: {:?}", other),
            },
            Ok(value) => panic!("Expected an API error, got Ok({:?})", value),
        }
    }

    #[track_caller]
    pub fn assert_auth_expired<T: std::fmt::Debug>(result: &ClientResult<T>) {
        assert_api_error(result, ApiClientError::is_auth_expired);
    }

    #[track_caller]
    pub fn assert_not_signed_in<T: std::fmt::Debug>(result: &ClientResult<T>) {
        match result {
            Err(ClientError::Session(booky_client::SessionError::NotAuthenticated)) => {}
            other => panic!("Expected NotAuthenticated, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_loan_status(loans: &[Loan], id: LoanId, expected: LoanStatus) {
        let loan = loans
            .iter()
            .find(|l| l.id == id)
            .unwrap_or_else(|| panic!("Loan {} not in list", id));
        assert_eq!(loan.status, expected, "Loan {} has status {}", id, loan.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seeded_library_has_fixtures() {
        let api = FakeLibraryApi::seeded();
        for book in fixtures::catalogue() {
            assert_eq!(api.book(book.book.id), Some(book));
        }
    }

    #[test]
    fn test_fixture_loan_due_date() {
        let borrowed_at = chrono::Utc::now();
        let loan = fixtures::loan(
            LoanId::new(1),
            fixtures::reader().id,
            BookId::new(10),
            LoanStatus::Borrowed,
            borrowed_at,
            BorrowDuration::TenDays,
        );
        assert_eq!(loan.due_at - loan.borrowed_at, chrono::Duration::days(10));
        assert!(loan.returned_at.is_none());
    }

    #[test]
    fn test_signed_in_store_has_session() {
        let store = signed_in_store(fixtures::admin());
        assert!(store.session().is_authenticated());
        assert_eq!(store.session().user().map(|u| u.role), Some(Role::Admin));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_ratings_are_valid(rating in generators::arb_rating()) {
            prop_assert!(Review::validate_rating(rating).is_ok());
        }

        #[test]
        fn prop_generated_loans_are_due_after_borrowing(loan in generators::arb_loan()) {
            prop_assert!(loan.due_at > loan.borrowed_at);
        }
    }
}
