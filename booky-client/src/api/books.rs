//! Catalogue endpoints.

use booky_core::{AuthorId, AuthorRef, Book, BookDraft, BookId, BookWithReviews, CategoryId, Page, Review};
use serde::Serialize;

use super::payload::{array_under, decode, decode_each, page_of, unwrap_data, RemoteBook, RemoteReview};
use super::transport::RestClient;
use crate::error::ApiClientError;
use crate::session::Credentials;

/// Filters for `GET /books`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

impl BookQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Default::default()
        }
    }

    /// Search text; blank text means no search.
    pub fn with_search(mut self, q: impl Into<String>) -> Self {
        let q = q.into();
        self.q = (!q.trim().is_empty()).then(|| q.trim().to_string());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

impl RestClient {
    pub async fn list_books(
        &self,
        creds: Option<&Credentials>,
        query: &BookQuery,
    ) -> Result<Page<Book>, ApiClientError> {
        let body = self.get_json("/books", creds, Some(query)).await?;
        let data = unwrap_data(&body);
        let books = decode_each(array_under(data, &["books"]), "book", RemoteBook::into_book);
        Ok(page_of(books, data.get("pagination"), query.page, query.limit))
    }

    pub async fn book_detail(
        &self,
        creds: Option<&Credentials>,
        id: BookId,
    ) -> Result<BookWithReviews, ApiClientError> {
        let body = self.get_json::<()>(&format!("/books/{}", id), creds, None).await?;
        Ok(decode::<RemoteBook>(unwrap_data(&body), "book detail")?.into_detail(id))
    }

    /// Author of a book, looked up through its detail.
    pub(crate) async fn book_author(
        &self,
        creds: Option<&Credentials>,
        id: BookId,
    ) -> Result<Option<AuthorRef>, ApiClientError> {
        let body = self.get_json::<()>(&format!("/books/{}", id), creds, None).await?;
        Ok(decode::<RemoteBook>(unwrap_data(&body), "book detail")?.author())
    }

    pub async fn book_reviews(
        &self,
        creds: Option<&Credentials>,
        id: BookId,
    ) -> Result<Vec<Review>, ApiClientError> {
        let body = self
            .get_json::<()>(&format!("/books/{}/reviews", id), creds, None)
            .await?;
        let items = array_under(unwrap_data(&body), &["reviews"]);
        Ok(decode_each(items, "review", |r: RemoteReview| Ok(r.into_review(id))))
    }

    pub async fn author_books(
        &self,
        creds: Option<&Credentials>,
        author_id: AuthorId,
    ) -> Result<Vec<Book>, ApiClientError> {
        let body = self
            .get_json::<()>(&format!("/authors/{}/books", author_id), creds, None)
            .await?;
        let items = array_under(unwrap_data(&body), &["books"]);
        Ok(decode_each(items, "book", RemoteBook::into_book))
    }

    pub async fn create_book(
        &self,
        creds: Option<&Credentials>,
        draft: &BookDraft,
    ) -> Result<Book, ApiClientError> {
        let body = self.post_json("/books", creds, draft).await?;
        decode::<RemoteBook>(unwrap_data(&body), "created book")?
            .into_book()
            .map_err(ApiClientError::Decode)
    }

    pub async fn update_book(
        &self,
        creds: Option<&Credentials>,
        id: BookId,
        draft: &BookDraft,
    ) -> Result<Book, ApiClientError> {
        let body = self.put_json(&format!("/books/{}", id), creds, draft).await?;
        Ok(decode::<RemoteBook>(unwrap_data(&body), "updated book")?.into_book_or(id))
    }

    pub async fn delete_book(
        &self,
        creds: Option<&Credentials>,
        id: BookId,
    ) -> Result<(), ApiClientError> {
        self.delete(&format!("/books/{}", id), creds).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booky_core::EntityIdType;

    #[test]
    fn test_query_params_skip_empty_fields() {
        let query = BookQuery::page(2).with_search("  ").with_category(CategoryId::new(4));
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            serde_json::json!({ "page": 2, "categoryId": 4 })
        );

        let query = BookQuery::default().with_search(" dune ").with_limit(6);
        assert_eq!(query.q.as_deref(), Some("dune"));
    }
}
