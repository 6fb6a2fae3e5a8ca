//! Session state: who is signed in and with which token.
//!
//! The REST client never touches this. Callers read credentials from the
//! [`SessionManager`] and pass them to each request, and report failures back
//! through [`SessionManager::handle_error`], which is the only place a
//! session is dropped because the server rejected it.

use booky_core::{Role, User, UserPatch};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

use crate::error::ApiClientError;

/// Bearer token issued by the library API.
///
/// The token is only readable through [`Credentials::bearer`] and when the
/// session is saved to disk.
#[derive(Debug, Clone)]
pub struct Credentials(SecretString);

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token.into().into_boxed_str()))
    }

    /// Value of the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0.expose_secret())
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.0.expose_secret() == other.0.expose_secret()
    }
}

impl Eq for Credentials {}

impl Serialize for Credentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.expose_secret())
    }
}

impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub credentials: Credentials,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Please sign in first")]
    NotAuthenticated,
    #[error("This action requires the {required} role")]
    Forbidden { required: Role },
}

/// Owner of the current [`Session`].
#[derive(Debug, Default)]
pub struct SessionManager {
    session: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.read().as_ref().map(|s| s.credentials.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.read().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    pub fn set_auth(&self, credentials: Credentials, user: User) {
        info!(user_id = %user.id, role = %user.role, "Signed in");
        *self.write() = Some(Session { credentials, user });
    }

    /// Merge a partial profile into the signed-in user. No-op when signed out.
    pub fn update_user(&self, patch: &UserPatch) {
        if let Some(session) = self.write().as_mut() {
            session.user.apply(patch);
        }
    }

    /// Drop the session. Returns whether there was one.
    pub fn logout(&self) -> bool {
        let had = self.write().take().is_some();
        if had {
            info!("Signed out");
        }
        had
    }

    /// React to a failed request. Only an expired or rejected token ends the
    /// session; returns whether it did.
    pub fn handle_error(&self, err: &ApiClientError) -> bool {
        if !err.is_auth_expired() {
            return false;
        }
        let cleared = self.write().take().is_some();
        if cleared {
            info!("Session expired, credentials cleared");
        } else {
            debug!("Auth rejected without an active session");
        }
        cleared
    }

    /// Guard for routes that need a signed-in user. `Role::Admin` also
    /// requires the admin role.
    pub fn require_auth(&self, role: Role) -> Result<Session, SessionError> {
        let session = self.current().ok_or(SessionError::NotAuthenticated)?;
        if role == Role::Admin && !session.user.is_admin() {
            return Err(SessionError::Forbidden { required: role });
        }
        Ok(session)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booky_core::{EntityIdType, UserId};

    fn user(role: Role) -> User {
        User {
            id: UserId::new(7),
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            phone: None,
            role,
        }
    }

    fn signed_in(role: Role) -> SessionManager {
        let manager = SessionManager::default();
        manager.set_auth(Credentials::new("tok"), user(role));
        manager
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::new("s3cr3t-token");
        assert!(!format!("{:?}", creds).contains("s3cr3t-token"));
        assert_eq!(creds.bearer(), "Bearer s3cr3t-token");
    }

    #[test]
    fn test_credentials_serialize_as_plain_token() {
        let creds = Credentials::new("tok");
        let json = serde_json::to_string(&creds).unwrap();
        assert_eq!(json, "\"tok\"");
        let back: Credentials = serde_json::from_str(&json).unwrap();
        assert_eq!(back, creds);
        assert_ne!(back, Credentials::new("other"));
    }

    #[test]
    fn test_only_auth_expired_clears_session() {
        let manager = signed_in(Role::User);
        assert!(!manager.handle_error(&ApiClientError::Timeout));
        assert!(!manager.handle_error(&ApiClientError::Forbidden {
            message: "no".to_string()
        }));
        assert!(manager.is_authenticated());

        assert!(manager.handle_error(&ApiClientError::AuthExpired {
            message: "expired".to_string()
        }));
        assert!(!manager.is_authenticated());
        assert!(!manager.handle_error(&ApiClientError::AuthExpired {
            message: "expired".to_string()
        }));
    }

    #[test]
    fn test_require_auth_checks_role() {
        assert_eq!(
            SessionManager::default().require_auth(Role::User),
            Err(SessionError::NotAuthenticated)
        );
        assert_eq!(
            signed_in(Role::User).require_auth(Role::Admin),
            Err(SessionError::Forbidden {
                required: Role::Admin
            })
        );
        assert!(signed_in(Role::Admin).require_auth(Role::Admin).is_ok());
        assert!(signed_in(Role::Admin).require_auth(Role::User).is_ok());
    }

    #[test]
    fn test_update_user_merges_patch() {
        let manager = signed_in(Role::User);
        manager.update_user(&UserPatch {
            name: Some("Grace H.".to_string()),
            ..Default::default()
        });
        let user = manager.user().unwrap();
        assert_eq!(user.name, "Grace H.");
        assert_eq!(user.email, "grace@example.com");

        assert!(manager.logout());
        manager.update_user(&UserPatch::default());
        assert!(manager.user().is_none());
    }
}
