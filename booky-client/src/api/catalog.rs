//! Authors, categories and cover uploads.

use booky_core::{Author, Category};
use serde::Serialize;

use super::payload::{array_under, decode, decode_each, parse_upload_url, unwrap_data};
use super::transport::RestClient;
use crate::error::ApiClientError;
use crate::session::Credentials;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAuthor {
    pub name: String,
    pub bio: String,
}

impl RestClient {
    pub async fn categories(&self, creds: Option<&Credentials>) -> Result<Vec<Category>, ApiClientError> {
        let body = self.get_json::<()>("/categories", creds, None).await?;
        let items = array_under(&body, &["data", "categories"]);
        Ok(decode_each(items, "category", |c: Category| Ok(c)))
    }

    pub async fn create_category(
        &self,
        creds: Option<&Credentials>,
        name: &str,
    ) -> Result<Category, ApiClientError> {
        let body = self
            .post_json("/categories", creds, &serde_json::json!({ "name": name }))
            .await?;
        decode(unwrap_data(&body), "category")
    }

    pub async fn create_author(
        &self,
        creds: Option<&Credentials>,
        author: &NewAuthor,
    ) -> Result<Author, ApiClientError> {
        let body = self.post_json("/authors", creds, author).await?;
        decode(unwrap_data(&body), "author")
    }

    /// Upload a cover image and return its public URL.
    pub async fn upload_cover(
        &self,
        creds: Option<&Credentials>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiClientError> {
        let body = self.post_file("/uploads", creds, file_name, bytes).await?;
        parse_upload_url(&body)
    }
}
