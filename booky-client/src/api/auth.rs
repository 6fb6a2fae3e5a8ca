//! Sign-in, registration and the signed-in user's profile.

use booky_core::ProfileSummary;
use serde::Serialize;

use super::payload::{decode, parse_auth, parse_profile_change, unwrap_data, AuthSession, ProfileChange};
use super::transport::RestClient;
use crate::error::ApiClientError;
use crate::session::Credentials;

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }
}

impl RestClient {
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthSession, ApiClientError> {
        let body = self.post_json("/auth/login", None, request).await?;
        parse_auth(&body)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, ApiClientError> {
        let body = self.post_json("/auth/register", None, request).await?;
        parse_auth(&body)
    }

    pub async fn my_profile(&self, creds: Option<&Credentials>) -> Result<ProfileSummary, ApiClientError> {
        let body = self.get_json::<()>("/me", creds, None).await?;
        decode(unwrap_data(&body), "profile")
    }

    pub async fn update_profile(
        &self,
        creds: Option<&Credentials>,
        update: &ProfileUpdate,
    ) -> Result<ProfileChange, ApiClientError> {
        let body = self.patch_json("/me", creds, update).await?;
        Ok(parse_profile_change(&body))
    }
}
