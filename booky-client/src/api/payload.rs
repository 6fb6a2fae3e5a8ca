//! Wire shapes of the library API and their normalization into domain types.
//!
//! The server is loose about its payloads: IDs arrive as numbers or strings,
//! counts may be null, lists sit under different keys depending on the
//! endpoint. Everything here is lenient on input and produces fully-populated
//! `booky_core` values.

use booky_core::{
    AdminLoan, AdminOverview, AdminUser, AuthorRef, Book, BookDetail, BookId, BookWithReviews,
    CatalogueTotals, CategoryRef, EntityIdType, Loan, LoanBook, LoanStatus, LoanTotals, Page,
    ReviewedBook, Review, Role, Timestamp, TopBorrowed, User, UserContact, UserPatch, UserRef,
    UserReview,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::ApiClientError;
use crate::session::Credentials;

pub(crate) const UPLOAD_URL_KEYS: [&str; 5] = ["url", "secureUrl", "secure_url", "fileUrl", "file_url"];

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// The `data` member of a `{ success, message, data }` envelope, or the body
/// itself when it is not wrapped.
pub(crate) fn unwrap_data(body: &Value) -> &Value {
    match body.get("data") {
        Some(data) if !data.is_null() => data,
        _ => body,
    }
}

pub(crate) fn parse_id<T: EntityIdType>(raw: Option<&Value>) -> Option<T> {
    match raw? {
        Value::Number(n) => n.as_i64().map(T::new),
        Value::String(s) => s.trim().parse::<i64>().ok().map(T::new),
        _ => None,
    }
}

fn count(raw: Option<f64>) -> u32 {
    match raw {
        Some(n) if n.is_finite() && n > 0.0 => n as u32,
        _ => 0,
    }
}

fn rating(raw: Option<f64>) -> f64 {
    raw.filter(|r| r.is_finite()).unwrap_or(0.0)
}

fn timestamp(raw: Option<&str>) -> Option<Timestamp> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn text_or_number(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn year(raw: Option<&Value>) -> Option<i32> {
    match raw? {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Deserialize `value` into `T`, or report what was wrong. A missing body
/// reads as an empty object.
pub(crate) fn decode<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T, ApiClientError> {
    let empty = Value::Object(serde_json::Map::new());
    let value = if value.is_null() { &empty } else { value };
    T::deserialize(value).map_err(|e| ApiClientError::Decode(format!("{}: {}", what, e)))
}

/// First array found under any of `keys`, else the value itself if it is an
/// array, else empty.
pub(crate) fn array_under<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_array))
        .or_else(|| value.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Decode every element of `items`, skipping the ones that cannot become a
/// domain value.
pub(crate) fn decode_each<R, T, F>(items: &[Value], what: &str, convert: F) -> Vec<T>
where
    R: DeserializeOwned,
    F: Fn(R) -> Result<T, String>,
{
    items
        .iter()
        .filter_map(|item| {
            let result = decode::<R>(item, what)
                .map_err(|e| e.to_string())
                .and_then(&convert);
            match result {
                Ok(value) => Some(value),
                Err(reason) => {
                    warn!(what, reason = %reason, "Skipping malformed item");
                    None
                }
            }
        })
        .collect()
}

// ============================================================================
// REMOTE SHAPES
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemoteAuthor {
    id: Option<Value>,
    name: Option<String>,
}

impl RemoteAuthor {
    fn into_ref(self) -> AuthorRef {
        AuthorRef {
            id: parse_id(self.id.as_ref()),
            name: self.name.unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemoteCategory {
    id: Option<Value>,
    name: Option<String>,
}

impl RemoteCategory {
    fn into_ref(self) -> Option<CategoryRef> {
        Some(CategoryRef {
            id: parse_id(self.id.as_ref())?,
            name: self.name.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemoteUser {
    id: Option<Value>,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    role: Option<String>,
    created_at: Option<String>,
}

impl RemoteUser {
    fn role(&self) -> Role {
        self.role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or_default()
    }

    pub(crate) fn into_user(self) -> Result<User, String> {
        let role = self.role();
        Ok(User {
            id: parse_id(self.id.as_ref()).ok_or("user without id")?,
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            phone: self.phone,
            role,
        })
    }

    fn into_ref(self) -> UserRef {
        UserRef {
            id: parse_id(self.id.as_ref()),
            name: self.name.unwrap_or_else(|| "User".to_string()),
        }
    }

    fn into_contact(self) -> Option<UserContact> {
        Some(UserContact {
            id: parse_id(self.id.as_ref())?,
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
        })
    }

    pub(crate) fn into_admin_user(self) -> Result<AdminUser, String> {
        let role = self.role();
        Ok(AdminUser {
            id: parse_id(self.id.as_ref()).ok_or("user without id")?,
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            role,
            created_at: timestamp(self.created_at.as_deref()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemoteReview {
    id: Option<Value>,
    book_id: Option<Value>,
    star: Option<f64>,
    rating: Option<f64>,
    comment: Option<String>,
    created_at: Option<String>,
    user: Option<RemoteUser>,
    book: Option<RemoteBook>,
}

impl RemoteReview {
    pub(crate) fn into_review(self, book_id: BookId) -> Review {
        let stars = self.star.or(self.rating).unwrap_or(0.0).clamp(0.0, 5.0);
        Review {
            id: parse_id(self.id.as_ref()),
            book_id: parse_id(self.book_id.as_ref()).unwrap_or(book_id),
            user: self.user.unwrap_or_default().into_ref(),
            rating: stars.round() as u8,
            comment: self.comment,
            created_at: timestamp(self.created_at.as_deref()).unwrap_or_else(Utc::now),
        }
    }

    /// A review from the signed-in user's own list. The author is filled in
    /// later from the book detail.
    pub(crate) fn into_user_review(mut self) -> Result<UserReview, String> {
        let book = self.book.take().unwrap_or_default();
        let book_id = parse_id(self.book_id.as_ref())
            .or_else(|| parse_id(book.id.as_ref()))
            .ok_or("review without book id")?;
        let reviewed = ReviewedBook {
            id: book_id,
            title: book.title.unwrap_or_default(),
            author: AuthorRef::unknown(),
        };
        Ok(UserReview {
            review: self.into_review(book_id),
            book: reviewed,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemoteBook {
    id: Option<Value>,
    title: Option<String>,
    description: Option<String>,
    cover_image: Option<String>,
    cover_url: Option<String>,
    rating: Option<f64>,
    available_copies: Option<f64>,
    total_copies: Option<f64>,
    borrow_count: Option<f64>,
    review_count: Option<f64>,
    author: Option<RemoteAuthor>,
    category: Option<RemoteCategory>,
    reviews: Option<Vec<RemoteReview>>,
    isbn: Option<Value>,
    published_year: Option<Value>,
}

impl RemoteBook {
    pub(crate) fn into_book(self) -> Result<Book, String> {
        let id = parse_id(self.id.as_ref()).ok_or("book without id")?;
        Ok(self.into_book_or(id))
    }

    /// Book summary; `id` stands in when the payload omits its own.
    pub(crate) fn into_book_or(self, fallback: BookId) -> Book {
        let id = parse_id(self.id.as_ref()).unwrap_or(fallback);
        Book {
            id,
            title: self.title.unwrap_or_default(),
            author: self.author.map(RemoteAuthor::into_ref).unwrap_or_else(|| AuthorRef {
                id: None,
                name: "Unknown".to_string(),
            }),
            cover_url: self.cover_image.or(self.cover_url),
            rating: rating(self.rating),
            stock: count(self.available_copies),
            categories: self
                .category
                .and_then(RemoteCategory::into_ref)
                .into_iter()
                .collect(),
            description: self.description,
        }
    }

    /// Detail view; `requested` stands in when the payload omits the id.
    pub(crate) fn into_detail(mut self, requested: BookId) -> BookWithReviews {
        let id = parse_id(self.id.as_ref()).unwrap_or(requested);
        let reviews = self
            .reviews
            .take()
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.into_review(id))
            .collect();
        let total_copies = count(self.total_copies);
        let borrow_count = count(self.borrow_count);
        let review_count = count(self.review_count);
        let isbn = text_or_number(self.isbn.as_ref());
        let published_year = year(self.published_year.as_ref());

        BookWithReviews {
            book: BookDetail {
                book: self.into_book_or(id),
                total_copies,
                borrow_count,
                review_count,
                isbn,
                published_year,
            },
            reviews,
        }
    }

    /// The author as the detail endpoint reports it, if it does.
    pub(crate) fn author(&self) -> Option<AuthorRef> {
        let author = self.author.as_ref()?;
        Some(AuthorRef {
            id: parse_id(author.id.as_ref()),
            name: author.name.clone()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemoteLoan {
    id: Option<Value>,
    user_id: Option<Value>,
    book_id: Option<Value>,
    status: Option<String>,
    borrowed_at: Option<String>,
    due_at: Option<String>,
    returned_at: Option<String>,
    book: Option<RemoteBook>,
    user: Option<RemoteUser>,
}

impl RemoteLoan {
    pub(crate) fn into_loan(self) -> Result<Loan, String> {
        self.into_parts().map(|(loan, _)| loan)
    }

    pub(crate) fn into_admin_loan(self) -> Result<AdminLoan, String> {
        self.into_parts().map(|(loan, user)| AdminLoan { loan, user })
    }

    fn into_parts(self) -> Result<(Loan, Option<UserContact>), String> {
        let id = parse_id(self.id.as_ref()).ok_or("loan without id")?;
        let book = self.book.unwrap_or_default();
        let book_id = parse_id(self.book_id.as_ref())
            .or_else(|| parse_id(book.id.as_ref()))
            .ok_or("loan without book id")?;
        let user_id = parse_id(self.user_id.as_ref())
            .or_else(|| self.user.as_ref().and_then(|u| parse_id(u.id.as_ref())))
            .ok_or("loan without user id")?;
        let status = match self.status.as_deref() {
            Some(raw) => raw.parse::<LoanStatus>().map_err(|e| e.to_string())?,
            None => LoanStatus::Borrowed,
        };
        let borrowed_at = timestamp(self.borrowed_at.as_deref()).ok_or("loan without borrowedAt")?;
        let due_at = timestamp(self.due_at.as_deref()).ok_or("loan without dueAt")?;

        let loan = Loan {
            id,
            user_id,
            book_id,
            status,
            borrowed_at,
            due_at,
            returned_at: timestamp(self.returned_at.as_deref()),
            book: LoanBook {
                id: book_id,
                title: book.title.unwrap_or_default(),
                cover_url: book.cover_image.or(book.cover_url),
                author: book
                    .author
                    .map(RemoteAuthor::into_ref)
                    .unwrap_or_else(AuthorRef::unknown),
            },
        };
        Ok((loan, self.user.and_then(RemoteUser::into_contact)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemotePagination {
    total: Option<f64>,
    page: Option<f64>,
    limit: Option<f64>,
}

/// Wrap `items` in a [`Page`], filling whatever the server left out from the
/// request or the items themselves.
pub(crate) fn page_of<T>(
    items: Vec<T>,
    pagination: Option<&Value>,
    requested_page: Option<u32>,
    requested_limit: Option<u32>,
) -> Page<T> {
    let pag = pagination
        .and_then(|p| RemotePagination::deserialize(p).ok())
        .unwrap_or_default();
    let len = items.len() as u32;
    Page {
        total: pag.total.map(|t| count(Some(t))).unwrap_or(len),
        page: pag
            .page
            .map(|p| count(Some(p)))
            .or(requested_page)
            .unwrap_or(1),
        limit: pag
            .limit
            .map(|l| count(Some(l)))
            .or(requested_limit)
            .unwrap_or(len),
        items,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteTopBorrowed {
    id: Option<Value>,
    title: Option<String>,
    borrow_count: Option<f64>,
    rating: Option<f64>,
    available_copies: Option<f64>,
    total_copies: Option<f64>,
    author: Option<RemoteAuthor>,
    category: Option<RemoteCategory>,
    cover_image: Option<String>,
    cover_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteTotals {
    users: Option<f64>,
    books: Option<f64>,
    active: Option<f64>,
    overdue: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemoteOverview {
    totals: Option<RemoteTotals>,
    loans: Option<RemoteTotals>,
    top_borrowed: Vec<Value>,
    generated_at: Option<String>,
}

impl RemoteOverview {
    pub(crate) fn into_overview(self) -> AdminOverview {
        let totals = self.totals.unwrap_or_default();
        let loans = self.loans.unwrap_or_default();
        let top_borrowed = decode_each(&self.top_borrowed, "top borrowed book", |b: RemoteTopBorrowed| {
            Ok(TopBorrowed {
                id: parse_id(b.id.as_ref()).ok_or("book without id")?,
                title: b.title.unwrap_or_default(),
                borrow_count: count(b.borrow_count),
                rating: rating(b.rating),
                available_copies: count(b.available_copies),
                total_copies: count(b.total_copies),
                author: b.author.map(RemoteAuthor::into_ref),
                category: b.category.and_then(RemoteCategory::into_ref),
                cover_url: b.cover_image.or(b.cover_url),
            })
        });

        AdminOverview {
            totals: CatalogueTotals {
                users: count(totals.users),
                books: count(totals.books),
            },
            loans: LoanTotals {
                active: count(loans.active),
                overdue: count(loans.overdue),
            },
            top_borrowed,
            generated_at: self.generated_at,
        }
    }
}

// ============================================================================
// AUTH AND PROFILE
// ============================================================================

/// Token and user returned by login and registration.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub credentials: Credentials,
    pub user: User,
}

pub(crate) fn parse_auth(body: &Value) -> Result<AuthSession, ApiClientError> {
    let inner = match body.get("data") {
        Some(data) if data.is_object() => data,
        _ => body,
    };
    let token = ["token", "accessToken", "jwt"]
        .iter()
        .find_map(|k| inner.get(*k).and_then(Value::as_str))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiClientError::Decode("Auth response missing token".to_string()))?;
    let user = ["user", "profile"]
        .iter()
        .find_map(|k| inner.get(*k).filter(|v| v.is_object()))
        .ok_or_else(|| ApiClientError::Decode("Auth response missing user".to_string()))?;
    let user = decode::<RemoteUser>(user, "auth user")?
        .into_user()
        .map_err(ApiClientError::Decode)?;

    Ok(AuthSession {
        credentials: Credentials::new(token),
        user,
    })
}

/// Result of `PATCH /me`: the fields the server confirmed and its message.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileChange {
    pub changes: UserPatch,
    pub message: String,
}

pub(crate) fn parse_profile_change(body: &Value) -> ProfileChange {
    let mut changes = UserPatch::default();
    if let Some(profile) = body
        .get("data")
        .and_then(|d| d.get("profile"))
        .and_then(Value::as_object)
    {
        changes.id = parse_id(profile.get("id"));
        changes.name = profile.get("name").and_then(Value::as_str).map(str::to_string);
        changes.email = profile.get("email").and_then(Value::as_str).map(str::to_string);
        changes.phone = match profile.get("phone") {
            Some(Value::Null) => Some(None),
            Some(Value::String(phone)) => Some(Some(phone.clone())),
            _ => None,
        };
        changes.role = profile
            .get("role")
            .and_then(Value::as_str)
            .and_then(|r| r.parse().ok());
    }
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Profile updated")
        .to_string();
    ProfileChange { changes, message }
}

pub(crate) fn parse_upload_url(body: &Value) -> Result<String, ApiClientError> {
    let payload = unwrap_data(body);
    UPLOAD_URL_KEYS
        .iter()
        .find_map(|k| payload.get(*k).and_then(Value::as_str))
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiClientError::Decode("Upload response missing file URL".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_book_normalization_defaults() {
        let book = decode::<RemoteBook>(
            &json!({ "id": "12", "title": "Dune", "coverImage": "c.png", "rating": null }),
            "book",
        )
        .unwrap()
        .into_book()
        .unwrap();

        assert_eq!(book.id, BookId::new(12));
        assert_eq!(book.author.name, "Unknown");
        assert_eq!(book.cover_url.as_deref(), Some("c.png"));
        assert_eq!(book.rating, 0.0);
        assert_eq!(book.stock, 0);
        assert!(book.categories.is_empty());
    }

    #[test]
    fn test_detail_normalization() {
        let detail = decode::<RemoteBook>(
            &json!({
                "title": "Emma",
                "availableCopies": 2,
                "totalCopies": 3,
                "isbn": 9780141439587u64,
                "publishedYear": "1815",
                "category": { "id": 4, "name": "Classics" },
                "author": { "id": 1, "name": "Austen" },
                "reviews": [{ "id": 5, "star": 4, "comment": "Lovely", "user": { "id": 2 } }]
            }),
            "book",
        )
        .unwrap()
        .into_detail(BookId::new(9));

        assert_eq!(detail.book.book.id, BookId::new(9));
        assert_eq!(detail.book.book.stock, 2);
        assert_eq!(detail.book.total_copies, 3);
        assert_eq!(detail.book.isbn.as_deref(), Some("9780141439587"));
        assert_eq!(detail.book.published_year, Some(1815));
        assert_eq!(detail.book.book.categories[0].name, "Classics");
        assert_eq!(detail.reviews.len(), 1);
        assert_eq!(detail.reviews[0].rating, 4);
        assert_eq!(detail.reviews[0].user.name, "User");
        assert_eq!(detail.reviews[0].book_id, BookId::new(9));
    }

    #[test]
    fn test_pagination_fallbacks() {
        let page = page_of(vec![1, 2, 3], None, Some(2), None);
        assert_eq!((page.total, page.page, page.limit), (3, 2, 3));

        let pag = json!({ "total": 40, "page": 3, "limit": 10 });
        let page = page_of(vec![1], Some(&pag), Some(1), Some(20));
        assert_eq!((page.total, page.page, page.limit), (40, 3, 10));

        let page = page_of(Vec::<u8>::new(), None, None, None);
        assert_eq!((page.total, page.page, page.limit), (0, 1, 0));
    }

    #[test]
    fn test_array_under_accepts_each_shape() {
        let bare = json!([{ "id": 1 }]);
        let wrapped = json!({ "data": [{ "id": 1 }] });
        let keyed = json!({ "categories": [{ "id": 1 }] });
        assert_eq!(array_under(&bare, &["data", "categories"]).len(), 1);
        assert_eq!(array_under(&wrapped, &["data", "categories"]).len(), 1);
        assert_eq!(array_under(&keyed, &["data", "categories"]).len(), 1);
        assert!(array_under(&json!({ "x": 1 }), &["data"]).is_empty());
    }

    #[test]
    fn test_malformed_items_are_skipped() {
        let items = vec![json!({ "id": 1, "title": "A" }), json!({ "title": "no id" })];
        let books = decode_each(&items, "book", RemoteBook::into_book);
        assert_eq!(books.len(), 1);
    }

    #[test]
    fn test_loan_normalization() {
        let loan = decode::<RemoteLoan>(
            &json!({
                "id": 1, "userId": 2, "bookId": 3, "status": "LATE",
                "borrowedAt": "2024-01-01T00:00:00.000Z",
                "dueAt": "2024-01-04T00:00:00Z",
                "book": { "id": 3, "title": "Dune", "coverImage": "d.png" }
            }),
            "loan",
        )
        .unwrap()
        .into_loan()
        .unwrap();

        assert_eq!(loan.status, LoanStatus::Overdue);
        assert_eq!(loan.book.author, AuthorRef::unknown());
        assert_eq!(loan.book.cover_url.as_deref(), Some("d.png"));

        let missing = decode::<RemoteLoan>(&json!({ "id": 1 }), "loan").unwrap().into_loan();
        assert!(missing.is_err());
    }

    #[test]
    fn test_auth_token_aliases() {
        let body = json!({ "data": { "accessToken": "abc", "profile": { "id": 1, "name": "Ada", "email": "a@x", "role": "ADMIN" } } });
        let auth = parse_auth(&body).unwrap();
        assert_eq!(auth.credentials.bearer(), "Bearer abc");
        assert_eq!(auth.user.role, Role::Admin);

        let unwrapped = json!({ "jwt": "t", "user": { "id": "5" } });
        assert_eq!(parse_auth(&unwrapped).unwrap().user.id.as_raw(), 5);

        assert!(parse_auth(&json!({ "data": { "user": { "id": 1 } } })).is_err());
    }

    #[test]
    fn test_profile_change_partial() {
        let change = parse_profile_change(&json!({
            "data": { "profile": { "name": "Ada L.", "phone": null, "role": "nope" } }
        }));
        assert_eq!(change.message, "Profile updated");
        assert_eq!(change.changes.name.as_deref(), Some("Ada L."));
        assert_eq!(change.changes.phone, Some(None));
        assert_eq!(change.changes.role, None);
        assert_eq!(change.changes.email, None);

        let change = parse_profile_change(&json!({ "message": "Saved" }));
        assert_eq!(change.message, "Saved");
        assert!(change.changes.is_empty());
    }

    #[test]
    fn test_upload_url_keys() {
        assert_eq!(
            parse_upload_url(&json!({ "data": { "secure_url": "https://cdn/x.png" } })).unwrap(),
            "https://cdn/x.png"
        );
        assert_eq!(parse_upload_url(&json!({ "fileUrl": "f" })).unwrap(), "f");
        assert_eq!(
            parse_upload_url(&json!({ "data": { "url": "" } })),
            Err(ApiClientError::Decode("Upload response missing file URL".to_string()))
        );
    }

    #[test]
    fn test_overview_defaults() {
        let overview = decode::<RemoteOverview>(
            &json!({ "totals": { "users": 3 }, "topBorrowed": [{ "id": 1, "coverUrl": "u" }, {}] }),
            "overview",
        )
        .unwrap()
        .into_overview();
        assert_eq!(overview.totals.users, 3);
        assert_eq!(overview.totals.books, 0);
        assert_eq!(overview.loans.overdue, 0);
        assert_eq!(overview.top_borrowed.len(), 1);
        assert_eq!(overview.top_borrowed[0].cover_url.as_deref(), Some("u"));
    }
}
