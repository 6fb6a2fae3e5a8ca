//! The store: API calls bound to query keys, plus session and cart.
//!
//! Reads go through the query cache under the keys in [`crate::keys`].
//! Writes go through [`QueryClient::mutate`] with the optimistic updates and
//! invalidations each operation needs. Every failed call is shown to the
//! [`SessionManager`] before it is returned, so an expired token ends the
//! session no matter which operation hit it.

use booky_core::{
    AdminLoan, AdminOverview, AdminUser, Author, AuthorId, Book, BookDraft, BookId,
    BookWithReviews, BorrowDuration, Category, Loan, LoanFilter, LoanId, Page, ProfileSummary,
    Review, ReviewId, Role, UserReview,
};
use booky_query::{
    Cacheable, MutationOptions, Optimistic, QueryClient, QueryConfig, QueryKey, QueryResult,
    Subscription, WeakQueryClient,
};
use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::api::{
    AuthSession, BookQuery, LibraryApi, LoginRequest, NewAuthor, ProfileChange, ProfileUpdate,
    RegisterRequest, RestClient, ReviewSubmission,
};
use crate::cart::{Cart, CartItem};
use crate::checkout::{Agreements, CheckoutError, CheckoutPlan, CheckoutReceipt};
use crate::config::ClientConfig;
use crate::error::{ApiClientError, ClientResult};
use crate::keys;
use crate::persistence::{self, PersistedState};
use crate::session::{Credentials, SessionManager};

/// Page size used for the signed-in user's review list.
pub const REVIEWS_PAGE_SIZE: u32 = 20;
/// Page size of the admin loan table.
pub const ADMIN_LOANS_PAGE_SIZE: u32 = 20;
/// How many books the "related" strip shows.
pub const RELATED_LIMIT: u32 = 6;

pub struct LibraryStore<A = RestClient> {
    api: Arc<A>,
    cache: QueryClient<ApiClientError>,
    session: Arc<SessionManager>,
    cart: Mutex<Cart>,
}

/// Show a failure to the session. When it ends the session, cached data of
/// that user is dropped too.
fn end_session_on(session: &SessionManager, cache: &WeakQueryClient<ApiClientError>, err: &ApiClientError) {
    if session.handle_error(err) {
        if let Some(cache) = cache.upgrade() {
            let removed = cache.clear();
            debug!(removed, "Cache cleared after session ended");
        }
    }
}

impl LibraryStore<RestClient> {
    /// Build a store talking to the configured server, restoring the saved
    /// session and cart.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let api = RestClient::new(config)?;
        let state = persistence::load(&config.state_path)?.unwrap_or_default();
        Ok(Self::new(api, config.query_config(), state))
    }
}

impl<A: LibraryApi> LibraryStore<A> {
    pub fn new(api: A, query_config: QueryConfig, state: PersistedState) -> Self {
        Self {
            api: Arc::new(api),
            cache: QueryClient::new(query_config),
            session: Arc::new(SessionManager::new(state.session)),
            cart: Mutex::new(state.cart),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn cache(&self) -> &QueryClient<ApiClientError> {
        &self.cache
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            session: self.session.current(),
            cart: self.cart(),
        }
    }

    pub fn save_state(&self, path: &Path) -> ClientResult<()> {
        persistence::save(path, &self.persisted_state())?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // plumbing
    // ------------------------------------------------------------------

    /// Let the session see a failure, then hand it back.
    fn observe<T>(&self, result: Result<T, ApiClientError>) -> Result<T, ApiClientError> {
        if let Err(err) = &result {
            end_session_on(&self.session, &self.cache.downgrade(), err);
        }
        result
    }

    /// Read-through query. Failures are reported to the session by the
    /// fetcher itself.
    async fn read<T, F, Fut>(&self, key: QueryKey, fetch: F) -> ClientResult<T>
    where
        T: Cacheable,
        F: Fn(Arc<A>, Option<Credentials>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiClientError>> + Send + 'static,
    {
        let fetcher = self.fetcher(fetch);
        let value = self
            .cache
            .query(key, fetcher)
            .await
            .map(QueryResult::into_value)
            .map_err(ApiClientError::from)?;
        Ok(value)
    }

    /// Wrap `fetch` for the cache. Credentials are looked up each time the
    /// fetcher runs, so refetches of mounted keys use the current session.
    /// A rejected token ends the session and empties the cache from inside
    /// the fetch, which covers refetches nobody awaits.
    fn fetcher<T, F, Fut>(
        &self,
        fetch: F,
    ) -> impl Fn() -> BoxFuture<'static, Result<T, ApiClientError>> + Send + Sync + 'static
    where
        T: Send + 'static,
        F: Fn(Arc<A>, Option<Credentials>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiClientError>> + Send + 'static,
    {
        let api = self.api.clone();
        let session = self.session.clone();
        let cache = self.cache.downgrade();
        move || {
            let request = fetch(api.clone(), session.credentials());
            let session = session.clone();
            let cache = cache.clone();
            async move {
                let result = request.await;
                if let Err(err) = &result {
                    end_session_on(&session, &cache, err);
                }
                result
            }
            .boxed()
        }
    }

    /// Run a write with its cache effects.
    async fn write<R, W>(&self, write: W, options: MutationOptions) -> ClientResult<R>
    where
        W: Future<Output = Result<R, ApiClientError>>,
    {
        let result = self
            .cache
            .mutate(write, options)
            .await
            .map_err(ApiClientError::from);
        Ok(self.observe(result)?)
    }

    fn require(&self, role: Role) -> ClientResult<Credentials> {
        Ok(self.session.require_auth(role)?.credentials)
    }

    fn lock_cart(&self) -> MutexGuard<'_, Cart> {
        self.cart.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // session
    // ------------------------------------------------------------------

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<AuthSession> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let auth = self.observe(self.api.login(&request).await)?;
        self.start_session(&auth);
        Ok(auth)
    }

    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<AuthSession> {
        let auth = self.observe(self.api.register(request).await)?;
        self.start_session(&auth);
        Ok(auth)
    }

    fn start_session(&self, auth: &AuthSession) {
        // Cached data belongs to whoever was signed in before.
        self.cache.clear();
        self.session.set_auth(auth.credentials.clone(), auth.user.clone());
    }

    pub fn logout(&self) -> bool {
        self.cache.clear();
        self.session.logout()
    }

    // ------------------------------------------------------------------
    // reads
    // ------------------------------------------------------------------

    pub async fn books(&self, q: Option<&str>, page: u32) -> ClientResult<Page<Book>> {
        let query = q.map_or_else(BookQuery::default, |q| BookQuery::default().with_search(q));
        let query = BookQuery {
            page: Some(page),
            ..query
        };
        self.read(keys::books(query.q.as_deref(), page), move |api, creds| {
            let query = query.clone();
            async move { api.list_books(creds.as_ref(), &query).await }
        })
        .await
    }

    pub async fn book_detail(&self, id: BookId) -> ClientResult<BookWithReviews> {
        self.read(keys::book_detail(id), move |api, creds| async move {
            api.book_detail(creds.as_ref(), id).await
        })
        .await
    }

    pub async fn book_reviews(&self, id: BookId) -> ClientResult<Vec<Review>> {
        self.read(keys::book_reviews(id), move |api, creds| async move {
            api.book_reviews(creds.as_ref(), id).await
        })
        .await
    }

    /// A few other books to show next to `id`.
    pub async fn related(&self, id: BookId) -> ClientResult<Vec<Book>> {
        self.read(keys::related(id), move |api, creds| async move {
            let query = BookQuery::page(1).with_limit(RELATED_LIMIT);
            let page = api.list_books(creds.as_ref(), &query).await?;
            Ok::<_, ApiClientError>(page.items.into_iter().filter(|b| b.id != id).collect::<Vec<_>>())
        })
        .await
    }

    pub async fn categories(&self) -> ClientResult<Vec<Category>> {
        self.read(keys::categories(), |api, creds| async move {
            api.categories(creds.as_ref()).await
        })
        .await
    }

    pub async fn author_books(&self, id: AuthorId) -> ClientResult<Vec<Book>> {
        self.read(keys::author_books(id), move |api, creds| async move {
            api.author_books(creds.as_ref(), id).await
        })
        .await
    }

    pub async fn loans(&self) -> ClientResult<Vec<Loan>> {
        self.require(Role::User)?;
        self.read(keys::loans(), |api, creds| async move {
            api.my_loans(creds.as_ref()).await
        })
        .await
    }

    pub async fn my_reviews(&self, page: u32) -> ClientResult<Page<UserReview>> {
        self.require(Role::User)?;
        self.read(keys::reviews(page), move |api, creds| async move {
            api.my_reviews(creds.as_ref(), page, REVIEWS_PAGE_SIZE).await
        })
        .await
    }

    pub async fn profile(&self) -> ClientResult<ProfileSummary> {
        self.require(Role::User)?;
        self.read(keys::profile(), |api, creds| async move {
            api.my_profile(creds.as_ref()).await
        })
        .await
    }

    /// Keep the book detail mounted: invalidations refetch it while the
    /// subscription is alive.
    pub fn watch_book_detail(&self, id: BookId) -> Subscription<BookWithReviews, ApiClientError> {
        let fetcher = self.fetcher(move |api: Arc<A>, creds: Option<Credentials>| async move {
            api.book_detail(creds.as_ref(), id).await
        });
        self.cache.subscribe(keys::book_detail(id), fetcher)
    }

    pub fn watch_loans(&self) -> Subscription<Vec<Loan>, ApiClientError> {
        let fetcher = self.fetcher(|api: Arc<A>, creds: Option<Credentials>| async move {
            api.my_loans(creds.as_ref()).await
        });
        self.cache.subscribe(keys::loans(), fetcher)
    }

    // ------------------------------------------------------------------
    // user writes
    // ------------------------------------------------------------------

    /// Post a review. The placeholder shows up at the top of the book's
    /// reviews right away and disappears again if the server refuses it.
    pub async fn submit_review(
        &self,
        book_id: BookId,
        rating: u8,
        comment: Option<String>,
    ) -> ClientResult<Review> {
        let creds = self.require(Role::User)?;
        let rating = Review::validate_rating(rating)?;

        let pending = Review::pending(book_id, rating, comment.clone(), Utc::now());
        let on_detail = {
            let pending = pending.clone();
            Optimistic::new(keys::book_detail(book_id), move |current: Option<BookWithReviews>| {
                current.map(|mut detail| {
                    detail.reviews.insert(0, pending);
                    detail
                })
            })
        };
        let on_list = Optimistic::new(keys::book_reviews(book_id), move |current: Option<Vec<Review>>| {
            current.map(|mut reviews| {
                reviews.insert(0, pending);
                reviews
            })
        });

        let submission = ReviewSubmission {
            book_id,
            rating,
            comment: comment.unwrap_or_default(),
        };
        let review = self
            .write(
                self.api.submit_review(Some(&creds), &submission),
                MutationOptions::new()
                    .optimistic(on_detail)
                    .optimistic(on_list)
                    .invalidates(keys::book_detail(book_id))
                    .invalidates(keys::book_reviews(book_id))
                    .invalidates(keys::all_reviews())
                    .invalidates(keys::loans()),
            )
            .await?;
        info!(book_id = %book_id, rating, "Review submitted");
        Ok(review)
    }

    pub async fn delete_review(&self, id: ReviewId) -> ClientResult<()> {
        let creds = self.require(Role::User)?;
        self.write(
            self.api.delete_review(Some(&creds), id),
            MutationOptions::new().invalidates(keys::all_reviews()),
        )
        .await
    }

    pub async fn borrow_book(&self, book_id: BookId, days: BorrowDuration) -> ClientResult<()> {
        let creds = self.require(Role::User)?;
        self.write(
            self.api.borrow_book(Some(&creds), book_id, days),
            MutationOptions::new()
                .invalidates(keys::loans())
                .invalidates(keys::book_detail(book_id)),
        )
        .await?;
        info!(book_id = %book_id, days = days.days(), "Book borrowed");
        Ok(())
    }

    pub async fn return_loan(&self, loan_id: LoanId) -> ClientResult<()> {
        let creds = self.require(Role::User)?;
        self.write(
            self.api.return_loan(Some(&creds), loan_id),
            MutationOptions::new().invalidates(keys::loans()),
        )
        .await?;
        info!(loan_id = %loan_id, "Loan returned");
        Ok(())
    }

    /// Update the profile and merge what the server confirmed into the session.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> ClientResult<ProfileChange> {
        let creds = self.require(Role::User)?;
        let change = self
            .write(
                self.api.update_profile(Some(&creds), update),
                MutationOptions::new().invalidates(keys::profile()),
            )
            .await?;
        self.session.update_user(&change.changes);
        Ok(change)
    }

    // ------------------------------------------------------------------
    // cart and checkout
    // ------------------------------------------------------------------

    pub fn cart(&self) -> Cart {
        self.lock_cart().clone()
    }

    pub fn add_to_cart(&self, item: CartItem) -> ClientResult<()> {
        self.lock_cart().add(item)?;
        Ok(())
    }

    pub fn remove_from_cart(&self, book_id: BookId) -> ClientResult<CartItem> {
        Ok(self.lock_cart().remove(book_id)?)
    }

    pub fn clear_cart(&self) -> usize {
        self.lock_cart().clear()
    }

    /// Preview a checkout of the selected cart items (all when `None`).
    pub fn checkout_plan(
        &self,
        selection: Option<&[BookId]>,
        duration: BorrowDuration,
    ) -> Result<CheckoutPlan, CheckoutError> {
        let items = self.lock_cart().selected(selection);
        CheckoutPlan::new(items, duration, Utc::now())
    }

    /// Borrow the selected cart items. They leave the cart immediately and
    /// come back if the server rejects the checkout.
    pub async fn checkout(
        &self,
        selection: Option<&[BookId]>,
        duration: BorrowDuration,
        agreements: Agreements,
    ) -> ClientResult<CheckoutReceipt> {
        let creds = self.require(Role::User)?;
        let plan = self.checkout_plan(selection, duration)?;
        let request = plan.confirm(agreements)?;

        let taken = self.lock_cart().take(&plan.book_ids());
        debug!(items = taken.len(), days = duration.days(), "Checkout started");

        let result = self
            .cache
            .mutate(
                self.api.checkout(Some(&creds), &request),
                MutationOptions::new().invalidates(keys::loans()),
            )
            .await
            .map_err(ApiClientError::from);

        match self.observe(result) {
            Ok(receipt) => {
                info!(loans = receipt.loan_ids.len(), "Checkout complete");
                Ok(receipt)
            }
            Err(err) => {
                self.lock_cart().restore(taken);
                Err(CheckoutError::Api(err).into())
            }
        }
    }

    // ------------------------------------------------------------------
    // admin
    // ------------------------------------------------------------------

    pub async fn admin_overview(&self) -> ClientResult<AdminOverview> {
        self.require(Role::Admin)?;
        self.read(keys::admin_overview(), |api, creds| async move {
            api.admin_overview(creds.as_ref()).await
        })
        .await
    }

    pub async fn admin_books(&self, q: Option<&str>, page: u32) -> ClientResult<Page<Book>> {
        self.require(Role::Admin)?;
        let query = q.map_or_else(BookQuery::default, |q| BookQuery::default().with_search(q));
        let query = BookQuery {
            page: Some(page),
            ..query
        };
        self.read(keys::admin_books(query.q.as_deref(), page), move |api, creds| {
            let query = query.clone();
            async move { api.list_books(creds.as_ref(), &query).await }
        })
        .await
    }

    pub async fn admin_loans(&self, page: u32, filter: LoanFilter) -> ClientResult<Page<AdminLoan>> {
        self.require(Role::Admin)?;
        self.read(keys::admin_loans(page, filter), move |api, creds| async move {
            api.admin_loans(creds.as_ref(), page, ADMIN_LOANS_PAGE_SIZE, filter).await
        })
        .await
    }

    pub async fn admin_users(&self, page: u32) -> ClientResult<Page<AdminUser>> {
        self.require(Role::Admin)?;
        self.read(keys::admin_users(page), move |api, creds| async move {
            api.admin_users(creds.as_ref(), None, page).await
        })
        .await
    }

    pub async fn create_book(&self, draft: &BookDraft) -> ClientResult<Book> {
        let creds = self.require(Role::Admin)?;
        draft.validate()?;
        self.write(
            self.api.create_book(Some(&creds), draft),
            MutationOptions::new().invalidates(keys::all_admin_books()),
        )
        .await
    }

    pub async fn update_book(&self, id: BookId, draft: &BookDraft) -> ClientResult<Book> {
        let creds = self.require(Role::Admin)?;
        draft.validate()?;
        self.write(
            self.api.update_book(Some(&creds), id, draft),
            MutationOptions::new()
                .invalidates(keys::book_detail(id))
                .invalidates(keys::all_admin_books()),
        )
        .await
    }

    pub async fn delete_book(&self, id: BookId) -> ClientResult<()> {
        let creds = self.require(Role::Admin)?;
        self.write(
            self.api.delete_book(Some(&creds), id),
            MutationOptions::new().invalidates(keys::all_admin_books()),
        )
        .await
    }

    pub async fn admin_mark_returned(&self, loan_id: LoanId) -> ClientResult<()> {
        let creds = self.require(Role::Admin)?;
        self.write(
            self.api.admin_mark_returned(Some(&creds), loan_id),
            MutationOptions::new().invalidates(keys::all_admin_loans()),
        )
        .await
    }

    pub async fn create_author(&self, author: &NewAuthor) -> ClientResult<Author> {
        let creds = self.require(Role::Admin)?;
        self.write(self.api.create_author(Some(&creds), author), MutationOptions::new())
            .await
    }

    pub async fn create_category(&self, name: &str) -> ClientResult<Category> {
        let creds = self.require(Role::Admin)?;
        self.write(
            self.api.create_category(Some(&creds), name),
            MutationOptions::new().invalidates(keys::categories()),
        )
        .await
    }

    pub async fn upload_cover(&self, file_name: &str, bytes: Vec<u8>) -> ClientResult<String> {
        let creds = self.require(Role::Admin)?;
        self.write(
            self.api.upload_cover(Some(&creds), file_name, bytes),
            MutationOptions::new(),
        )
        .await
    }
}
