//! Types for authentication

use serde::{Deserialize, Serialize};

use super::Session;

/// User data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: String,

    /// The user's email address
    #[serde(default)]
    pub email: Option<String>,

    /// The user's phone number
    #[serde(default)]
    pub phone: Option<String>,

    /// The app metadata
    #[serde(default)]
    pub app_metadata: serde_json::Value,

    /// The user metadata, filled by the identity provider
    #[serde(default)]
    pub user_metadata: serde_json::Value,

    /// The creation time
    #[serde(default)]
    pub created_at: Option<String>,

    /// The update time
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl User {
    /// A non-empty string entry of the user metadata
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        self.user_metadata
            .get(key)
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// OAuth providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    /// The provider id used by the auth server
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
        }
    }
}

/// OAuth sign-in options
#[derive(Debug, Clone, Default)]
pub struct OAuthSignInOptions {
    pub redirect_to: Option<String>,
    pub scopes: Option<String>,
    /// PKCE challenge; set by `Auth::sign_in_with_oauth`
    pub code_challenge: Option<String>,
}

/// Kind of session change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// A session change notification
#[derive(Debug, Clone)]
pub struct SessionChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}
