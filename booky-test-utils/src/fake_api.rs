//! In-memory library server behind the [`LibraryApi`] trait.
//!
//! Behaves like the REST API closely enough for store tests: tokens are
//! checked, stock goes down on borrow and up on return, checkout is all or
//! nothing. Failures can be injected per operation with
//! [`FakeLibraryApi::fail_next`], where the operation name is the trait
//! method name (`"checkout"`, `"book_detail"`, ...).

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use booky_client::{
    ApiClientError, AuthSession, BookQuery, CheckoutReceipt, CheckoutRequest, Credentials,
    LibraryApi, LoginRequest, NewAuthor, ProfileChange, ProfileUpdate, RegisterRequest,
    ReviewSubmission,
};
use booky_core::{
    AdminLoan, AdminOverview, AdminUser, Author, AuthorId, AuthorRef, Book, BookDetail, BookDraft,
    BookId, BookWithReviews, BorrowDuration, CatalogueTotals, Category, CategoryId, CategoryRef,
    EntityIdType, Loan, LoanBook, LoanFilter, LoanId, LoanStats, LoanStatus, LoanTotals, Page,
    Profile, ProfileSummary, Review, ReviewId, ReviewedBook, Role, Timestamp, TopBorrowed, User,
    UserContact, UserId, UserPatch, UserRef, UserReview,
};
use chrono::Utc;

use crate::fixtures;

/// Password of every seeded account.
pub const DEFAULT_PASSWORD: &str = "secret";

const DEFAULT_PAGE_SIZE: u32 = 10;
const TOP_BORROWED: usize = 5;

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
    created_at: Timestamp,
}

#[derive(Debug)]
struct Library {
    accounts: Vec<Account>,
    books: BTreeMap<BookId, BookDetail>,
    reviews: Vec<Review>,
    loans: Vec<Loan>,
    authors: Vec<Author>,
    categories: Vec<Category>,
    next_id: i64,
    token_epoch: u64,
}

impl Default for Library {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            books: BTreeMap::new(),
            reviews: Vec::new(),
            loans: Vec::new(),
            authors: Vec::new(),
            categories: Vec::new(),
            next_id: 1000,
            token_epoch: 0,
        }
    }
}

impl Library {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn token(&self, user_id: UserId) -> Credentials {
        Credentials::new(format!("fake:{}:{}", user_id, self.token_epoch))
    }

    fn authorize(&self, creds: Option<&Credentials>) -> Result<User, ApiClientError> {
        let expired = || ApiClientError::AuthExpired {
            message: "Token expired".to_string(),
        };
        let bearer = creds.ok_or_else(expired)?.bearer();
        let mut parts = bearer.strip_prefix("Bearer fake:").ok_or_else(expired)?.split(':');
        let user_id: i64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(expired)?;
        let epoch: u64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(expired)?;
        if epoch != self.token_epoch {
            return Err(expired());
        }
        self.accounts
            .iter()
            .find(|a| a.user.id.as_raw() == user_id)
            .map(|a| a.user.clone())
            .ok_or_else(expired)
    }

    fn authorize_admin(&self, creds: Option<&Credentials>) -> Result<User, ApiClientError> {
        let user = self.authorize(creds)?;
        if !user.is_admin() {
            return Err(ApiClientError::Forbidden {
                message: "Admin access required".to_string(),
            });
        }
        Ok(user)
    }

    fn book_mut(&mut self, id: BookId) -> Result<&mut BookDetail, ApiClientError> {
        self.books.get_mut(&id).ok_or_else(|| not_found("Book"))
    }

    fn lend(&mut self, user: &User, book_id: BookId, days: BorrowDuration, now: Timestamp) -> Result<LoanId, ApiClientError> {
        let book = self.book_mut(book_id)?;
        if book.book.stock == 0 {
            return Err(ApiClientError::Conflict {
                message: format!("'{}' is out of stock", book.book.title),
            });
        }
        book.book.stock -= 1;
        book.borrow_count += 1;
        let loan_book = LoanBook {
            id: book_id,
            title: book.book.title.clone(),
            cover_url: book.book.cover_url.clone(),
            author: book.book.author.clone(),
        };

        let id = LoanId::new(self.next_id());
        self.loans.push(Loan {
            id,
            user_id: user.id,
            book_id,
            status: LoanStatus::Borrowed,
            borrowed_at: now,
            due_at: now + days.as_chrono(),
            returned_at: None,
            book: loan_book,
        });
        Ok(id)
    }

    fn close_loan(&mut self, loan_id: LoanId, owner: Option<UserId>) -> Result<(), ApiClientError> {
        let loan = self
            .loans
            .iter_mut()
            .find(|l| l.id == loan_id && owner.map_or(true, |u| l.user_id == u))
            .ok_or_else(|| not_found("Loan"))?;
        if !loan.status.is_active() {
            return Err(ApiClientError::Conflict {
                message: "Loan already returned".to_string(),
            });
        }
        loan.status = LoanStatus::Returned;
        loan.returned_at = Some(Utc::now());
        let book_id = loan.book_id;
        if let Some(book) = self.books.get_mut(&book_id) {
            book.book.stock += 1;
        }
        Ok(())
    }

    fn refresh_rating(&mut self, book_id: BookId) {
        let ratings: Vec<u32> = self
            .reviews
            .iter()
            .filter(|r| r.book_id == book_id)
            .map(|r| u32::from(r.rating))
            .collect();
        if let Some(book) = self.books.get_mut(&book_id) {
            book.review_count = ratings.len() as u32;
            book.book.rating = if ratings.is_empty() {
                0.0
            } else {
                f64::from(ratings.iter().sum::<u32>()) / ratings.len() as f64
            };
        }
    }

    fn author_ref(&self, id: Option<AuthorId>) -> Result<AuthorRef, ApiClientError> {
        let id = id.ok_or_else(|| validation("authorId is required"))?;
        self.authors
            .iter()
            .find(|a| a.id == id)
            .map(|a| AuthorRef {
                id: Some(a.id),
                name: a.name.clone(),
            })
            .ok_or_else(|| not_found("Author"))
    }

    fn category_refs(&self, id: Option<CategoryId>) -> Result<Vec<CategoryRef>, ApiClientError> {
        let id = id.ok_or_else(|| validation("categoryId is required"))?;
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| {
                vec![CategoryRef {
                    id: c.id,
                    name: c.name.clone(),
                }]
            })
            .ok_or_else(|| not_found("Category"))
    }
}

fn not_found(what: &str) -> ApiClientError {
    ApiClientError::NotFound {
        message: format!("{} not found", what),
    }
}

fn validation(message: &str) -> ApiClientError {
    ApiClientError::Validation {
        message: message.to_string(),
    }
}

fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> Page<T> {
    let page = page.max(1);
    let limit = limit.max(1);
    let total = items.len() as u32;
    let items = items
        .into_iter()
        .skip(((page - 1) * limit) as usize)
        .take(limit as usize)
        .collect();
    Page {
        items,
        total,
        page,
        limit,
    }
}

/// In-memory stand-in for the REST API.
#[derive(Debug, Default)]
pub struct FakeLibraryApi {
    library: Mutex<Library>,
    failures: Mutex<HashMap<&'static str, VecDeque<ApiClientError>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    latency: Mutex<Option<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeLibraryApi {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// A library with [`fixtures::reader`], [`fixtures::admin`], one author,
    /// one category and the books of [`fixtures::catalogue`].
    pub fn seeded() -> Self {
        let api = Self::new();
        api.add_account(fixtures::reader(), DEFAULT_PASSWORD);
        api.add_account(fixtures::admin(), DEFAULT_PASSWORD);
        {
            let mut lib = api.library();
            lib.authors.push(fixtures::author());
            lib.categories.push(fixtures::category());
        }
        for book in fixtures::catalogue() {
            api.add_book(book);
        }
        api
    }

    pub fn add_account(&self, user: User, password: &str) {
        self.library().accounts.push(Account {
            user,
            password: password.to_string(),
            created_at: Utc::now(),
        });
    }

    pub fn add_book(&self, book: BookDetail) {
        self.library().books.insert(book.book.id, book);
    }

    pub fn add_loan(&self, loan: Loan) {
        self.library().loans.push(loan);
    }

    pub fn add_review(&self, review: Review) {
        let book_id = review.book_id;
        let mut lib = self.library();
        lib.reviews.push(review);
        lib.refresh_rating(book_id);
    }

    /// Make the next call of `op` fail with `err`. Calls queue up.
    pub fn fail_next(&self, op: &'static str, err: ApiClientError) {
        lock(&self.failures).entry(op).or_default().push_back(err);
    }

    /// How many times `op` was called, failed calls included.
    pub fn calls(&self, op: &'static str) -> usize {
        lock(&self.calls).get(op).copied().unwrap_or(0)
    }

    /// Delay every call by `latency` (use with a paused tokio clock).
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = Some(latency);
    }

    /// Invalidate every token handed out so far.
    pub fn expire_tokens(&self) {
        self.library().token_epoch += 1;
    }

    /// A valid token for `user_id`, as if they had signed in.
    pub fn token_for(&self, user_id: UserId) -> Credentials {
        self.library().token(user_id)
    }

    pub fn book(&self, id: BookId) -> Option<BookDetail> {
        self.library().books.get(&id).cloned()
    }

    pub fn loans_of(&self, user_id: UserId) -> Vec<Loan> {
        self.library()
            .loans
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn reviews_of(&self, book_id: BookId) -> Vec<Review> {
        self.library()
            .reviews
            .iter()
            .filter(|r| r.book_id == book_id)
            .cloned()
            .collect()
    }

    fn library(&self) -> MutexGuard<'_, Library> {
        lock(&self.library)
    }

    async fn enter(&self, op: &'static str) -> Result<(), ApiClientError> {
        *lock(&self.calls).entry(op).or_insert(0) += 1;
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match lock(&self.failures).get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LibraryApi for FakeLibraryApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthSession, ApiClientError> {
        self.enter("login").await?;
        let lib = self.library();
        let account = lib
            .accounts
            .iter()
            .find(|a| a.user.email.eq_ignore_ascii_case(&request.email) && a.password == request.password)
            .ok_or_else(|| ApiClientError::AuthExpired {
                message: "Invalid email or password".to_string(),
            })?;
        Ok(AuthSession {
            credentials: lib.token(account.user.id),
            user: account.user.clone(),
        })
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, ApiClientError> {
        self.enter("register").await?;
        if request.name.trim().is_empty() || request.email.trim().is_empty() {
            return Err(validation("Name and email are required"));
        }
        if request.password.len() < 6 {
            return Err(validation("Password must be at least 6 characters"));
        }
        let mut lib = self.library();
        if lib.accounts.iter().any(|a| a.user.email.eq_ignore_ascii_case(&request.email)) {
            return Err(ApiClientError::Conflict {
                message: "Email already registered".to_string(),
            });
        }
        let user = User {
            id: UserId::new(lib.next_id()),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            phone: request.phone.clone(),
            role: Role::User,
        };
        lib.accounts.push(Account {
            user: user.clone(),
            password: request.password.clone(),
            created_at: Utc::now(),
        });
        Ok(AuthSession {
            credentials: lib.token(user.id),
            user,
        })
    }

    async fn my_profile(&self, creds: Option<&Credentials>) -> Result<ProfileSummary, ApiClientError> {
        self.enter("my_profile").await?;
        let lib = self.library();
        let user = lib.authorize(creds)?;
        let now = Utc::now();
        let mut stats = LoanStats::default();
        for loan in lib.loans.iter().filter(|l| l.user_id == user.id) {
            stats.total += 1;
            if loan.is_late(now) {
                stats.late += 1;
            } else if loan.status.is_active() {
                stats.borrowed += 1;
            } else {
                stats.returned += 1;
            }
        }
        let created_at = lib
            .accounts
            .iter()
            .find(|a| a.user.id == user.id)
            .map(|a| a.created_at);
        Ok(ProfileSummary {
            profile: Profile {
                id: user.id,
                name: user.name,
                email: user.email,
                role: user.role,
                created_at,
            },
            loan_stats: stats,
            reviews_count: lib.reviews.iter().filter(|r| r.user.id == Some(user.id)).count() as u32,
        })
    }

    async fn update_profile(
        &self,
        creds: Option<&Credentials>,
        update: &ProfileUpdate,
    ) -> Result<ProfileChange, ApiClientError> {
        self.enter("update_profile").await?;
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(validation("Name cannot be empty"));
        }
        let mut lib = self.library();
        let user = lib.authorize(creds)?;
        let changes = UserPatch {
            name: update.name.clone(),
            phone: update.phone.clone().map(Some),
            ..Default::default()
        };
        if let Some(account) = lib.accounts.iter_mut().find(|a| a.user.id == user.id) {
            account.user.apply(&changes);
        }
        Ok(ProfileChange {
            changes,
            message: "Profile updated".to_string(),
        })
    }

    async fn list_books(&self, _creds: Option<&Credentials>, query: &BookQuery) -> Result<Page<Book>, ApiClientError> {
        self.enter("list_books").await?;
        let lib = self.library();
        let needle = query.q.as_deref().map(str::to_lowercase);
        let books = lib
            .books
            .values()
            .filter(|b| {
                needle.as_deref().map_or(true, |q| {
                    b.book.title.to_lowercase().contains(q) || b.book.author.name.to_lowercase().contains(q)
                })
            })
            .filter(|b| {
                query
                    .category_id
                    .map_or(true, |c| b.book.categories.iter().any(|r| r.id == c))
            })
            .map(|b| b.book.clone())
            .collect();
        Ok(paginate(
            books,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        ))
    }

    async fn book_detail(&self, _creds: Option<&Credentials>, id: BookId) -> Result<BookWithReviews, ApiClientError> {
        self.enter("book_detail").await?;
        let lib = self.library();
        let book = lib.books.get(&id).cloned().ok_or_else(|| not_found("Book"))?;
        let reviews = lib.reviews.iter().rev().filter(|r| r.book_id == id).cloned().collect();
        Ok(BookWithReviews { book, reviews })
    }

    async fn book_reviews(&self, _creds: Option<&Credentials>, id: BookId) -> Result<Vec<Review>, ApiClientError> {
        self.enter("book_reviews").await?;
        let lib = self.library();
        if !lib.books.contains_key(&id) {
            return Err(not_found("Book"));
        }
        Ok(lib.reviews.iter().rev().filter(|r| r.book_id == id).cloned().collect())
    }

    async fn author_books(&self, _creds: Option<&Credentials>, author_id: AuthorId) -> Result<Vec<Book>, ApiClientError> {
        self.enter("author_books").await?;
        let lib = self.library();
        Ok(lib
            .books
            .values()
            .filter(|b| b.book.author.id == Some(author_id))
            .map(|b| b.book.clone())
            .collect())
    }

    async fn create_book(&self, creds: Option<&Credentials>, draft: &BookDraft) -> Result<Book, ApiClientError> {
        self.enter("create_book").await?;
        let mut lib = self.library();
        lib.authorize_admin(creds)?;
        draft.validate().map_err(|e| validation(&e.to_string()))?;
        let author = lib.author_ref(draft.author_id)?;
        let categories = lib.category_refs(draft.category_id)?;
        let book = Book {
            id: BookId::new(lib.next_id()),
            title: draft.title.trim().to_string(),
            author,
            cover_url: draft.cover_image.clone(),
            rating: 0.0,
            stock: draft.total_copies,
            categories,
            description: draft.description.clone(),
        };
        lib.books.insert(
            book.id,
            BookDetail {
                book: book.clone(),
                total_copies: draft.total_copies,
                borrow_count: 0,
                review_count: 0,
                isbn: draft.isbn.clone(),
                published_year: draft.published_year,
            },
        );
        Ok(book)
    }

    async fn update_book(
        &self,
        creds: Option<&Credentials>,
        id: BookId,
        draft: &BookDraft,
    ) -> Result<Book, ApiClientError> {
        self.enter("update_book").await?;
        let mut lib = self.library();
        lib.authorize_admin(creds)?;
        draft.validate().map_err(|e| validation(&e.to_string()))?;
        let author = lib.author_ref(draft.author_id)?;
        let categories = lib.category_refs(draft.category_id)?;
        let detail = lib.book_mut(id)?;
        let lent = detail.total_copies.saturating_sub(detail.book.stock);
        if draft.total_copies < lent {
            return Err(validation("totalCopies is below the number of copies on loan"));
        }
        detail.book.title = draft.title.trim().to_string();
        detail.book.author = author;
        detail.book.categories = categories;
        detail.book.description = draft.description.clone();
        if draft.cover_image.is_some() {
            detail.book.cover_url = draft.cover_image.clone();
        }
        detail.book.stock = draft.total_copies - lent;
        detail.total_copies = draft.total_copies;
        detail.isbn = draft.isbn.clone();
        detail.published_year = draft.published_year;
        Ok(detail.book.clone())
    }

    async fn delete_book(&self, creds: Option<&Credentials>, id: BookId) -> Result<(), ApiClientError> {
        self.enter("delete_book").await?;
        let mut lib = self.library();
        lib.authorize_admin(creds)?;
        if lib.loans.iter().any(|l| l.book_id == id && l.status.is_active()) {
            return Err(ApiClientError::Conflict {
                message: "Book has active loans".to_string(),
            });
        }
        lib.books.remove(&id).map(|_| ()).ok_or_else(|| not_found("Book"))
    }

    async fn categories(&self, _creds: Option<&Credentials>) -> Result<Vec<Category>, ApiClientError> {
        self.enter("categories").await?;
        Ok(self.library().categories.clone())
    }

    async fn create_category(&self, creds: Option<&Credentials>, name: &str) -> Result<Category, ApiClientError> {
        self.enter("create_category").await?;
        let mut lib = self.library();
        lib.authorize_admin(creds)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(validation("Category name is required"));
        }
        if lib.categories.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            return Err(ApiClientError::Conflict {
                message: "Category already exists".to_string(),
            });
        }
        let now = Utc::now();
        let category = Category {
            id: CategoryId::new(lib.next_id()),
            name: name.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        lib.categories.push(category.clone());
        Ok(category)
    }

    async fn create_author(&self, creds: Option<&Credentials>, author: &NewAuthor) -> Result<Author, ApiClientError> {
        self.enter("create_author").await?;
        let mut lib = self.library();
        lib.authorize_admin(creds)?;
        if author.name.trim().is_empty() {
            return Err(validation("Author name is required"));
        }
        let now = Utc::now();
        let author = Author {
            id: AuthorId::new(lib.next_id()),
            name: author.name.trim().to_string(),
            bio: author.bio.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        lib.authors.push(author.clone());
        Ok(author)
    }

    async fn upload_cover(
        &self,
        creds: Option<&Credentials>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiClientError> {
        self.enter("upload_cover").await?;
        self.library().authorize_admin(creds)?;
        if bytes.is_empty() {
            return Err(validation("Empty file"));
        }
        Ok(format!("https://covers.example.test/{}", file_name))
    }

    async fn borrow_book(
        &self,
        creds: Option<&Credentials>,
        book_id: BookId,
        days: BorrowDuration,
    ) -> Result<(), ApiClientError> {
        self.enter("borrow_book").await?;
        let mut lib = self.library();
        let user = lib.authorize(creds)?;
        lib.lend(&user, book_id, days, Utc::now())?;
        Ok(())
    }

    async fn checkout(
        &self,
        creds: Option<&Credentials>,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt, ApiClientError> {
        self.enter("checkout").await?;
        let mut lib = self.library();
        let user = lib.authorize(creds)?;
        if request.items.is_empty() {
            return Err(validation("No items to check out"));
        }
        // Check every line before lending anything.
        for line in &request.items {
            let book = lib.books.get(&line.book_id).ok_or_else(|| not_found("Book"))?;
            if book.book.stock < line.qty {
                return Err(ApiClientError::Conflict {
                    message: format!("Not enough copies of '{}'", book.book.title),
                });
            }
        }
        let now = Utc::now();
        let mut loan_ids = Vec::new();
        for line in &request.items {
            for _ in 0..line.qty {
                loan_ids.push(lib.lend(&user, line.book_id, request.days, now)?);
            }
        }
        Ok(CheckoutReceipt { loan_ids })
    }

    async fn my_loans(&self, creds: Option<&Credentials>) -> Result<Vec<Loan>, ApiClientError> {
        self.enter("my_loans").await?;
        let lib = self.library();
        let user = lib.authorize(creds)?;
        Ok(lib.loans.iter().filter(|l| l.user_id == user.id).cloned().collect())
    }

    async fn return_loan(&self, creds: Option<&Credentials>, loan_id: LoanId) -> Result<(), ApiClientError> {
        self.enter("return_loan").await?;
        let mut lib = self.library();
        let user = lib.authorize(creds)?;
        lib.close_loan(loan_id, Some(user.id))
    }

    async fn submit_review(
        &self,
        creds: Option<&Credentials>,
        submission: &ReviewSubmission,
    ) -> Result<Review, ApiClientError> {
        self.enter("submit_review").await?;
        let mut lib = self.library();
        let user = lib.authorize(creds)?;
        let rating = Review::validate_rating(submission.rating).map_err(|e| validation(&e.to_string()))?;
        if !lib.books.contains_key(&submission.book_id) {
            return Err(not_found("Book"));
        }
        let comment = submission.comment.trim();
        let review = Review {
            id: Some(ReviewId::new(lib.next_id())),
            book_id: submission.book_id,
            user: UserRef {
                id: Some(user.id),
                name: user.name,
            },
            rating,
            comment: (!comment.is_empty()).then(|| comment.to_string()),
            created_at: Utc::now(),
        };
        lib.reviews.push(review.clone());
        lib.refresh_rating(submission.book_id);
        Ok(review)
    }

    async fn delete_review(&self, creds: Option<&Credentials>, id: ReviewId) -> Result<(), ApiClientError> {
        self.enter("delete_review").await?;
        let mut lib = self.library();
        let user = lib.authorize(creds)?;
        let index = lib
            .reviews
            .iter()
            .position(|r| r.id == Some(id) && r.user.id == Some(user.id))
            .ok_or_else(|| not_found("Review"))?;
        let review = lib.reviews.remove(index);
        lib.refresh_rating(review.book_id);
        Ok(())
    }

    async fn my_reviews(
        &self,
        creds: Option<&Credentials>,
        page: u32,
        limit: u32,
    ) -> Result<Page<UserReview>, ApiClientError> {
        self.enter("my_reviews").await?;
        let lib = self.library();
        let user = lib.authorize(creds)?;
        let reviews = lib
            .reviews
            .iter()
            .rev()
            .filter(|r| r.user.id == Some(user.id))
            .filter_map(|r| {
                let book = lib.books.get(&r.book_id)?;
                Some(UserReview {
                    review: r.clone(),
                    book: ReviewedBook {
                        id: book.book.id,
                        title: book.book.title.clone(),
                        author: book.book.author.clone(),
                    },
                })
            })
            .collect();
        Ok(paginate(reviews, page, limit))
    }

    async fn admin_overview(&self, creds: Option<&Credentials>) -> Result<AdminOverview, ApiClientError> {
        self.enter("admin_overview").await?;
        let lib = self.library();
        lib.authorize_admin(creds)?;
        let now = Utc::now();

        let mut ranked: Vec<&BookDetail> = lib.books.values().collect();
        ranked.sort_by(|a, b| b.borrow_count.cmp(&a.borrow_count));
        let top_borrowed = ranked
            .into_iter()
            .take(TOP_BORROWED)
            .map(|b| TopBorrowed {
                id: b.book.id,
                title: b.book.title.clone(),
                borrow_count: b.borrow_count,
                rating: b.book.rating,
                available_copies: b.book.stock,
                total_copies: b.total_copies,
                author: Some(b.book.author.clone()),
                category: b.book.categories.first().cloned(),
                cover_url: b.book.cover_url.clone(),
            })
            .collect();

        Ok(AdminOverview {
            totals: CatalogueTotals {
                users: lib.accounts.len() as u32,
                books: lib.books.len() as u32,
            },
            loans: LoanTotals {
                active: lib.loans.iter().filter(|l| l.status.is_active()).count() as u32,
                overdue: lib.loans.iter().filter(|l| l.is_late(now)).count() as u32,
            },
            top_borrowed,
            generated_at: Some(now.to_rfc3339()),
        })
    }

    async fn admin_loans(
        &self,
        creds: Option<&Credentials>,
        page: u32,
        limit: u32,
        filter: LoanFilter,
    ) -> Result<Page<AdminLoan>, ApiClientError> {
        self.enter("admin_loans").await?;
        let lib = self.library();
        lib.authorize_admin(creds)?;
        let now = Utc::now();
        let loans = lib
            .loans
            .iter()
            .filter(|l| match filter {
                LoanFilter::All => true,
                LoanFilter::Active => l.status.is_active(),
                LoanFilter::Returned => l.status == LoanStatus::Returned,
                LoanFilter::Overdue => l.is_late(now),
            })
            .map(|l| AdminLoan {
                loan: l.clone(),
                user: lib.accounts.iter().find(|a| a.user.id == l.user_id).map(|a| UserContact {
                    id: a.user.id,
                    name: a.user.name.clone(),
                    email: a.user.email.clone(),
                }),
            })
            .collect();
        Ok(paginate(loans, page, limit))
    }

    async fn admin_users(
        &self,
        creds: Option<&Credentials>,
        q: Option<&str>,
        page: u32,
    ) -> Result<Page<AdminUser>, ApiClientError> {
        self.enter("admin_users").await?;
        let lib = self.library();
        lib.authorize_admin(creds)?;
        let needle = q.map(str::to_lowercase);
        let users = lib
            .accounts
            .iter()
            .filter(|a| {
                needle.as_deref().map_or(true, |q| {
                    a.user.name.to_lowercase().contains(q) || a.user.email.to_lowercase().contains(q)
                })
            })
            .map(|a| AdminUser {
                id: a.user.id,
                name: a.user.name.clone(),
                email: a.user.email.clone(),
                role: a.user.role,
                created_at: Some(a.created_at),
            })
            .collect();
        Ok(paginate(users, page, DEFAULT_PAGE_SIZE))
    }

    async fn admin_mark_returned(&self, creds: Option<&Credentials>, loan_id: LoanId) -> Result<(), ApiClientError> {
        self.enter("admin_mark_returned").await?;
        let mut lib = self.library();
        lib.authorize_admin(creds)?;
        lib.close_loan(loan_id, None)
    }
}
