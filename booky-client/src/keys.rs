//! Query keys used by the store.
//!
//! The first segment names the resource, so invalidating `["loans"]` hits
//! every key built by [`loans`] while leaving `["admin-loans", ..]` alone.

use booky_core::{AuthorId, BookId, EntityIdType, LoanFilter};
use booky_query::{query_key, QueryKey};

pub const BOOKS: &str = "books";
pub const BOOK_DETAIL: &str = "book-detail";
pub const BOOK_REVIEWS: &str = "book-reviews";
pub const RELATED: &str = "related";
pub const CATEGORIES: &str = "categories";
pub const LOANS: &str = "loans";
pub const REVIEWS: &str = "reviews";
pub const PROFILE: &str = "profile";
pub const AUTHOR_BOOKS: &str = "author-books";
pub const ADMIN_OVERVIEW: &str = "admin-overview";
pub const ADMIN_BOOKS: &str = "admin-books";
pub const ADMIN_LOANS: &str = "admin-loans";
pub const ADMIN_USERS: &str = "admin-users";

pub fn books(q: Option<&str>, page: u32) -> QueryKey {
    query_key![BOOKS, q.map(str::to_string), page]
}

pub fn book_detail(id: BookId) -> QueryKey {
    query_key![BOOK_DETAIL, id.as_raw()]
}

pub fn book_reviews(id: BookId) -> QueryKey {
    query_key![BOOK_REVIEWS, id.as_raw()]
}

pub fn related(id: BookId) -> QueryKey {
    query_key![RELATED, id.as_raw()]
}

pub fn categories() -> QueryKey {
    query_key![CATEGORIES]
}

pub fn loans() -> QueryKey {
    query_key![LOANS]
}

/// Prefix of every page of the signed-in user's reviews.
pub fn all_reviews() -> QueryKey {
    query_key![REVIEWS]
}

pub fn reviews(page: u32) -> QueryKey {
    query_key![REVIEWS, page]
}

pub fn profile() -> QueryKey {
    query_key![PROFILE]
}

pub fn author_books(id: AuthorId) -> QueryKey {
    query_key![AUTHOR_BOOKS, id.as_raw()]
}

pub fn admin_overview() -> QueryKey {
    query_key![ADMIN_OVERVIEW]
}

pub fn all_admin_books() -> QueryKey {
    query_key![ADMIN_BOOKS]
}

pub fn admin_books(q: Option<&str>, page: u32) -> QueryKey {
    query_key![ADMIN_BOOKS, q.map(str::to_string), page]
}

pub fn all_admin_loans() -> QueryKey {
    query_key![ADMIN_LOANS]
}

pub fn admin_loans(page: u32, filter: LoanFilter) -> QueryKey {
    query_key![ADMIN_LOANS, page, filter.as_str()]
}

pub fn admin_users(page: u32) -> QueryKey {
    query_key![ADMIN_USERS, page]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_do_not_cross_resources() {
        assert!(reviews(3).starts_with(&all_reviews()));
        assert!(!admin_loans(1, LoanFilter::All).starts_with(&loans()));
        assert!(admin_books(Some("dune"), 2).starts_with(&all_admin_books()));
        assert_ne!(books(None, 1), books(Some(""), 1));
    }
}
