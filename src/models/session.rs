// src/models/session.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to an auth user at sign-up.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A user as reported by the identity provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Seconds before the recorded expiry at which an access token is treated
/// as already expired.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds. Unknown for sessions that never expire.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl Session {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now >= expires_at - EXPIRY_MARGIN_SECS)
    }
}

/// Changes a signed-in user can push to the identity provider.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<UserMetadata>,
}

/// The currently authenticated user, reduced to what the site needs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
}

impl From<&AuthUser> for Principal {
    fn from(user: &AuthUser) -> Self {
        Principal {
            id: user.id,
            email: user.email.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    SignedIn,
    SignedOut,
    UserUpdated,
    TokenRefreshed,
}

/// Notification pushed to session-change subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session: Option<Session>,
}
