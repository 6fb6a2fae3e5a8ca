//! Reviews written by the signed-in user.

use booky_core::{BookId, Page, Review, ReviewId, UserReview};
use futures_util::future::join_all;
use serde::Serialize;

use super::payload::{array_under, decode, decode_each, page_of, unwrap_data, RemoteReview};
use super::transport::RestClient;
use crate::error::ApiClientError;
use crate::session::Credentials;

/// Body of `POST /reviews`. The server calls the rating `star`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    pub book_id: BookId,
    #[serde(rename = "star")]
    pub rating: u8,
    pub comment: String,
}

impl RestClient {
    pub async fn submit_review(
        &self,
        creds: Option<&Credentials>,
        submission: &ReviewSubmission,
    ) -> Result<Review, ApiClientError> {
        let body = self.post_json("/reviews", creds, submission).await?;
        let review = decode::<RemoteReview>(unwrap_data(&body), "review")?.into_review(submission.book_id);
        Ok(review)
    }

    pub async fn delete_review(
        &self,
        creds: Option<&Credentials>,
        id: ReviewId,
    ) -> Result<(), ApiClientError> {
        self.delete(&format!("/reviews/{}", id), creds).await?;
        Ok(())
    }

    /// One page of the signed-in user's reviews, with each book's author
    /// filled in.
    pub async fn my_reviews(
        &self,
        creds: Option<&Credentials>,
        page: u32,
        limit: u32,
    ) -> Result<Page<UserReview>, ApiClientError> {
        let body = self
            .get_json("/me/reviews", creds, Some(&[("page", page), ("limit", limit)]))
            .await?;
        let data = unwrap_data(&body);
        let reviews = decode_each(
            array_under(data, &["reviews"]),
            "review",
            RemoteReview::into_user_review,
        );

        let authors = join_all(
            reviews
                .iter()
                .map(|r| self.author_or_unknown(creds, r.book.id)),
        )
        .await;
        let reviews = reviews
            .into_iter()
            .zip(authors)
            .map(|(mut review, author)| {
                review.book.author = author;
                review
            })
            .collect();
        Ok(page_of(reviews, data.get("pagination"), Some(page), Some(limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booky_core::EntityIdType;

    #[test]
    fn test_submission_renames_rating() {
        let body = serde_json::to_value(ReviewSubmission {
            book_id: BookId::new(3),
            rating: 4,
            comment: "Great".to_string(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "bookId": 3, "star": 4, "comment": "Great" })
        );
    }
}
