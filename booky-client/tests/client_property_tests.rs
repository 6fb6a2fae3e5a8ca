//! Store behaviour against the in-memory library server.

use std::time::Duration;

use booky_client::{keys, persistence, Agreements, ApiClientError, Cart, CheckoutError, ClientError, SessionError};
use booky_core::{BookId, BorrowDuration, EntityIdType, LoanStatus, Review, Role};
use booky_test_utils::assertions::{assert_auth_expired, assert_loan_status, assert_not_signed_in};
use booky_test_utils::{fixtures, generators, signed_in_store, store_with, FakeLibraryApi, PersistedState};
use proptest::prelude::*;

fn left_hand() -> BookId {
    fixtures::catalogue()[0].book.id
}

fn dispossessed() -> BookId {
    fixtures::catalogue()[1].book.id
}

#[tokio::test(start_paused = true)]
async fn returned_loan_shows_after_invalidation() {
    let store = signed_in_store(fixtures::reader());
    store.borrow_book(left_hand(), BorrowDuration::FiveDays).await.unwrap();

    let loans = store.loans().await.unwrap();
    assert_eq!(loans.len(), 1);
    let loan_id = loans[0].id;
    assert_loan_status(&loans, loan_id, LoanStatus::Borrowed);

    store.return_loan(loan_id).await.unwrap();

    let loans = store.loans().await.unwrap();
    assert_loan_status(&loans, loan_id, LoanStatus::Returned);
    assert_eq!(store.api().calls("my_loans"), 2);
}

#[tokio::test(start_paused = true)]
async fn mounted_loans_refetch_during_return() {
    let store = signed_in_store(fixtures::reader());
    store.borrow_book(left_hand(), BorrowDuration::ThreeDays).await.unwrap();

    let loans = store.watch_loans();
    let loan_id = loans.fetch().await.unwrap().into_value()[0].id;

    store.return_loan(loan_id).await.unwrap();

    // The refetch finished before the write returned.
    let state = loans.state().unwrap().unwrap();
    assert!(!state.is_stale);
    assert_loan_status(&state.data.unwrap(), loan_id, LoanStatus::Returned);
}

#[tokio::test(start_paused = true)]
async fn mounted_loans_refetch_with_credentials_of_new_login() {
    let store = signed_in_store(fixtures::reader());
    let loans = store.watch_loans();
    assert!(loans.fetch().await.unwrap().into_value().is_empty());

    store.api().expire_tokens();
    store
        .login(&fixtures::reader().email, booky_test_utils::DEFAULT_PASSWORD)
        .await
        .unwrap();
    assert!(store.session().is_authenticated());

    store.borrow_book(left_hand(), BorrowDuration::FiveDays).await.unwrap();

    let state = loans.state().unwrap().unwrap();
    assert!(state.error.is_none());
    assert_eq!(state.data.map(|l| l.len()), Some(1));
    assert_eq!(loans.fetch().await.unwrap().into_value().len(), 1);
    assert!(store.session().is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn rejected_refetch_of_mounted_view_ends_session() {
    let store = signed_in_store(fixtures::reader());
    let loans = store.watch_loans();
    loans.fetch().await.unwrap();
    store.books(None, 1).await.unwrap();

    store.api().expire_tokens();
    store.cache().invalidate(&keys::loans()).await;

    assert!(!store.session().is_authenticated());
    // Only the mounted entry survives, reset to empty.
    assert_eq!(store.cache().stats().entry_count, 1);
    assert!(loans.state().unwrap().unwrap().data.is_none());
    assert_not_signed_in(&store.loans().await);
}

#[tokio::test(start_paused = true)]
async fn concurrent_detail_reads_share_one_request() {
    let store = signed_in_store(fixtures::reader());
    store.api().set_latency(Duration::from_millis(100));

    let (a, b) = tokio::join!(store.book_detail(left_hand()), store.book_detail(left_hand()));
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(store.api().calls("book_detail"), 1);

    // Fresh data is served from cache.
    store.book_detail(left_hand()).await.unwrap();
    assert_eq!(store.api().calls("book_detail"), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_review_rolls_back_to_previous_list() {
    let store = signed_in_store(fixtures::reader());
    let book_id = left_hand();
    assert!(store.book_reviews(book_id).await.unwrap().is_empty());

    store.api().set_latency(Duration::from_millis(100));
    store.api().fail_next(
        "submit_review",
        ApiClientError::Validation {
            message: "You already reviewed this book".to_string(),
        },
    );

    let key = keys::book_reviews(book_id);
    let (result, during) = tokio::join!(
        store.submit_review(book_id, 4, Some("Great".to_string())),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.cache().get_query_data::<Vec<Review>>(&key).unwrap()
        }
    );

    let during = during.unwrap();
    assert_eq!(during.len(), 1);
    assert!(during[0].is_pending());

    let err = result.unwrap_err();
    assert_eq!(
        err.api_error().and_then(ApiClientError::server_message),
        Some("You already reviewed this book")
    );
    assert_eq!(store.cache().get_query_data::<Vec<Review>>(&key).unwrap(), Some(vec![]));
    assert_eq!(store.cache().stats().rollbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn accepted_review_replaces_placeholder() {
    let store = signed_in_store(fixtures::reader());
    let book_id = dispossessed();
    store.book_reviews(book_id).await.unwrap();

    let review = store.submit_review(book_id, 5, None).await.unwrap();
    assert!(!review.is_pending());

    let reviews = store.book_reviews(book_id).await.unwrap();
    assert_eq!(reviews, vec![review]);
}

#[tokio::test]
async fn invalid_rating_never_reaches_the_server() {
    let store = signed_in_store(fixtures::reader());
    let result = store.submit_review(left_hand(), 6, None).await;
    assert!(matches!(result, Err(ClientError::Validation(_))));
    assert_eq!(store.api().calls("submit_review"), 0);
}

#[tokio::test]
async fn failed_checkout_puts_items_back() {
    let store = signed_in_store(fixtures::reader());
    let catalogue = fixtures::catalogue();
    store.add_to_cart(fixtures::cart_item(&catalogue[0].book, 1)).unwrap();
    store.add_to_cart(fixtures::cart_item(&catalogue[1].book, 1)).unwrap();
    let before = store.cart();

    store.api().fail_next(
        "checkout",
        ApiClientError::Server {
            status: 503,
            message: "Service unavailable".to_string(),
        },
    );
    let result = store
        .checkout(None, BorrowDuration::FiveDays, Agreements::accepted())
        .await;

    assert!(matches!(
        result,
        Err(ClientError::Checkout(CheckoutError::Api(ApiClientError::Server { status: 503, .. })))
    ));
    assert_eq!(store.cart(), before);
}

#[tokio::test]
async fn checkout_of_a_selection_keeps_the_rest() {
    let store = signed_in_store(fixtures::reader());
    let catalogue = fixtures::catalogue();
    store.add_to_cart(fixtures::cart_item(&catalogue[0].book, 2)).unwrap();
    store.add_to_cart(fixtures::cart_item(&catalogue[1].book, 1)).unwrap();

    let selection = [left_hand()];
    let receipt = store
        .checkout(Some(&selection), BorrowDuration::TenDays, Agreements::accepted())
        .await
        .unwrap();

    assert_eq!(receipt.loan_ids.len(), 2);
    let cart = store.cart();
    assert_eq!(cart.len(), 1);
    assert!(cart.contains(dispossessed()));
    assert_eq!(store.loans().await.unwrap().len(), 2);
}

#[tokio::test]
async fn checkout_requires_both_agreements() {
    let store = signed_in_store(fixtures::reader());
    store
        .add_to_cart(fixtures::cart_item(&fixtures::catalogue()[0].book, 1))
        .unwrap();

    let agreements = Agreements {
        return_on_time: true,
        borrowing_policy: false,
    };
    let result = store.checkout(None, BorrowDuration::FiveDays, agreements).await;
    assert!(matches!(
        result,
        Err(ClientError::Checkout(CheckoutError::AgreementMissing(_)))
    ));
    assert_eq!(store.cart().len(), 1);
    assert_eq!(store.api().calls("checkout"), 0);
}

#[tokio::test]
async fn expired_token_ends_session_and_clears_cache() {
    let store = signed_in_store(fixtures::reader());
    store.books(None, 1).await.unwrap();
    assert!(store.cache().stats().entry_count > 0);

    store.api().expire_tokens();
    assert_auth_expired(&store.loans().await);

    assert!(!store.session().is_authenticated());
    assert_eq!(store.cache().stats().entry_count, 0);
    assert_not_signed_in(&store.loans().await);
}

#[tokio::test]
async fn other_errors_keep_the_session() {
    let store = signed_in_store(fixtures::reader());
    store.api().fail_next(
        "my_loans",
        ApiClientError::NotFound {
            message: "gone".to_string(),
        },
    );
    assert!(store.loans().await.is_err());
    assert!(store.session().is_authenticated());
}

#[tokio::test]
async fn admin_routes_need_admin_role() {
    let store = signed_in_store(fixtures::reader());
    let result = store.admin_overview().await;
    assert!(matches!(
        result,
        Err(ClientError::Session(SessionError::Forbidden { required: Role::Admin }))
    ));
    assert_eq!(store.api().calls("admin_overview"), 0);

    let admin = signed_in_store(fixtures::admin());
    let overview = admin.admin_overview().await.unwrap();
    assert_eq!(overview.totals.books, fixtures::catalogue().len() as u32);
}

#[tokio::test]
async fn login_replaces_cached_data_of_previous_user() {
    let store = store_with(FakeLibraryApi::seeded(), PersistedState::default());
    store.books(None, 1).await.unwrap();

    let auth = store
        .login(&fixtures::reader().email, booky_test_utils::DEFAULT_PASSWORD)
        .await
        .unwrap();
    assert_eq!(auth.user, fixtures::reader());
    assert_eq!(store.cache().stats().entry_count, 0);
    assert_eq!(store.session().user(), Some(fixtures::reader()));

    assert!(store.logout());
    assert!(!store.logout());
}

#[tokio::test]
async fn session_and_cart_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let store = signed_in_store(fixtures::reader());
    store
        .add_to_cart(fixtures::cart_item(&fixtures::catalogue()[0].book, 2))
        .unwrap();
    store.save_state(&path).unwrap();

    let state = persistence::load(&path).unwrap().unwrap();
    let restored = store_with(FakeLibraryApi::seeded(), state);
    assert_eq!(restored.session().user(), Some(fixtures::reader()));
    assert_eq!(restored.cart(), store.cart());
    assert_eq!(restored.loans().await.unwrap(), vec![]);
}

#[tokio::test]
async fn related_books_exclude_the_current_one() {
    let store = signed_in_store(fixtures::reader());
    let related = store.related(left_hand()).await.unwrap();
    assert!(!related.is_empty());
    assert!(related.iter().all(|b| b.id != left_hand()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_cart_merges_quantities(items in prop::collection::vec(generators::arb_cart_item(), 0..20)) {
        let mut cart = Cart::new();
        for item in &items {
            cart.add(item.clone()).unwrap();
        }

        let mut ids: Vec<BookId> = items.iter().map(|i| i.book_id).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(cart.len(), ids.len());
        prop_assert_eq!(cart.total_quantity(), items.iter().map(|i| i.qty).sum::<u32>());

        for id in ids {
            let expected: u32 = items.iter().filter(|i| i.book_id == id).map(|i| i.qty).sum();
            let qty = cart.items().iter().find(|i| i.book_id == id).map(|i| i.qty);
            prop_assert_eq!(qty, Some(expected));
        }
    }

    #[test]
    fn prop_take_then_restore_keeps_quantities(
        items in prop::collection::vec(generators::arb_cart_item(), 1..12),
        picked in prop::collection::vec(1i64..6, 0..4),
    ) {
        let mut cart = Cart::new();
        for item in items {
            cart.add(item).unwrap();
        }
        let before = cart.total_quantity();
        let picked: Vec<BookId> = picked.into_iter().map(BookId::new).collect();

        let taken = cart.take(&picked);
        prop_assert!(taken.iter().all(|i| picked.contains(&i.book_id)));
        prop_assert!(cart.items().iter().all(|i| !picked.contains(&i.book_id)));

        cart.restore(taken);
        prop_assert_eq!(cart.total_quantity(), before);
    }
}
