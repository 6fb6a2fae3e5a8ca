//! HTTP plumbing shared by every endpoint.

use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiClientError;
use crate::session::Credentials;

/// REST client for the library API.
///
/// Holds no session state: each call gets the credentials to send, if any.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiClientError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("{}/api", config.api_base_url.trim_end_matches('/')),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) async fn get_json<Q>(
        &self,
        path: &str,
        creds: Option<&Credentials>,
        query: Option<&Q>,
    ) -> Result<Value, ApiClientError>
    where
        Q: Serialize + ?Sized,
    {
        let mut request = self.request(Method::GET, path, creds);
        if let Some(query) = query {
            request = request.query(query);
        }
        self.send(Method::GET, path, request).await
    }

    pub(crate) async fn post_json<B>(
        &self,
        path: &str,
        creds: Option<&Credentials>,
        body: &B,
    ) -> Result<Value, ApiClientError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::POST, path, creds).json(body);
        self.send(Method::POST, path, request).await
    }

    pub(crate) async fn put_json<B>(
        &self,
        path: &str,
        creds: Option<&Credentials>,
        body: &B,
    ) -> Result<Value, ApiClientError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::PUT, path, creds).json(body);
        self.send(Method::PUT, path, request).await
    }

    pub(crate) async fn patch_json<B>(
        &self,
        path: &str,
        creds: Option<&Credentials>,
        body: &B,
    ) -> Result<Value, ApiClientError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::PATCH, path, creds).json(body);
        self.send(Method::PATCH, path, request).await
    }

    pub(crate) async fn delete(
        &self,
        path: &str,
        creds: Option<&Credentials>,
    ) -> Result<Value, ApiClientError> {
        let request = self.request(Method::DELETE, path, creds);
        self.send(Method::DELETE, path, request).await
    }

    /// Upload one file as multipart/form-data under the `file` field.
    pub(crate) async fn post_file(
        &self,
        path: &str,
        creds: Option<&Credentials>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ApiClientError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let request = self.request(Method::POST, path, creds).multipart(form);
        self.send(Method::POST, path, request).await
    }

    fn request(&self, method: Method, path: &str, creds: Option<&Credentials>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.request(method, url);
        match creds {
            Some(creds) => request.header(AUTHORIZATION, creds.bearer()),
            None => request,
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Value, ApiClientError> {
        let response = request.send().await.map_err(|e| {
            debug!(%method, path, error = %e, "API request failed");
            ApiClientError::from(e)
        })?;
        let status = response.status();
        debug!(%method, path, status = status.as_u16(), "API response");
        let text = response.text().await?;
        parse_body(status, &text)
    }
}

/// Turn a response into JSON or a classified error.
///
/// Empty success bodies (204) come back as `Value::Null`. Error bodies that
/// carry a `message` keep it for display.
pub(crate) fn parse_body(status: StatusCode, text: &str) -> Result<Value, ApiClientError> {
    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_str(text)?);
    }

    let message = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| {
            body.get("message")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .or_else(|| {
            let trimmed = text.trim();
            (!trimmed.is_empty() && trimmed.len() <= 200 && !trimmed.starts_with('<'))
                .then(|| trimmed.to_string())
        });
    Err(ApiClientError::from_status(status, message))
}
