//! Session management for authentication

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::User;

/// Session data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The access token
    pub access_token: String,

    /// The refresh token
    pub refresh_token: String,

    /// The token type
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// The expiry time in seconds
    pub expires_in: i64,

    /// The expiry timestamp
    #[serde(default)]
    pub expires_at: Option<i64>,

    /// The signed-in user
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Create a new session expiring `expires_in` seconds from now
    pub fn new(access_token: String, refresh_token: String, expires_in: i64, user: User) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: default_token_type(),
            expires_in,
            expires_at: Some(Utc::now().timestamp() + expires_in),
            user,
        }
    }

    /// Fill in `expires_at` when the server only sent `expires_in`
    pub(crate) fn with_expiry(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(Utc::now().timestamp() + self.expires_in);
        }
        self
    }

    /// Id of the identity the session belongs to
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now().timestamp() >= expires_at,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "u1".to_string(),
            email: Some("ana@example.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn fresh_session_is_not_expired() {
        let session = Session::new("a".into(), "r".into(), 3600, user());
        assert!(!session.is_expired());
        assert_eq!(session.user_id(), "u1");
    }

    #[test]
    fn past_expiry_is_expired() {
        let mut session = Session::new("a".into(), "r".into(), 3600, user());
        session.expires_at = Some(Utc::now().timestamp() - 1);
        assert!(session.is_expired());
    }

    #[test]
    fn deserializes_token_response() {
        let session: Session = serde_json::from_value(serde_json::json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 60,
            "user": { "id": "u1", "email": "ana@example.com" }
        }))
        .unwrap();

        assert_eq!(session.token_type, "bearer");
        assert!(session.expires_at.is_none());
        assert!(session.with_expiry().expires_at.is_some());
    }
}
