//! Authentication against Supabase Auth

mod pkce;
mod session;
mod subscription;
mod types;

use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use url::Url;

use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::fetch::Fetch;

pub use pkce::*;
pub use session::*;
pub use subscription::*;
pub use types::*;

/// Client for Supabase Authentication
pub struct Auth {
    /// The base URL for the Supabase project
    url: String,

    /// The API key for the Supabase project
    key: String,

    /// HTTP client used for requests
    client: Client,

    /// The current session
    session: Arc<RwLock<Option<Session>>>,

    /// Session change feed
    changes: broadcast::Sender<SessionChange>,

    /// PKCE verifier of the sign-in started last, until its code is exchanged
    code_verifier: Arc<RwLock<Option<String>>>,

    /// Client options
    options: ClientOptions,
}

/// Tokens carried in the fragment of an implicit-flow callback URL
#[derive(Debug, Deserialize)]
struct CallbackTokens {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

impl Auth {
    /// Create a new Auth client
    pub(crate) fn new(url: &str, key: &str, client: Client, options: ClientOptions) -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            url: url.to_string(),
            key: key.to_string(),
            client,
            session: Arc::new(RwLock::new(None)),
            changes,
            code_verifier: Arc::new(RwLock::new(None)),
            options,
        }
    }

    fn get_auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        // No subscribers is not an error
        let delivered = self.changes.send(SessionChange { event, session }).unwrap_or(0);
        debug!("Session change {:?} delivered to {} listeners", event, delivered);
    }

    fn store(&self, session: Option<Session>) {
        let mut current = self.session.write().unwrap_or_else(PoisonError::into_inner);
        *current = session;
    }

    /// The session held in memory, without refreshing it
    pub fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current session, refreshed first if it expired and auto-refresh is on
    pub async fn get_session(&self) -> Result<Option<Session>> {
        match self.current_session() {
            Some(session) if session.is_expired() && self.options.auto_refresh_token => {
                self.refresh_session().await.map(Some)
            }
            other => Ok(other),
        }
    }

    /// Install a session obtained elsewhere and notify listeners
    pub fn set_session(&self, session: Session) {
        info!("Signed in as {}", session.user_id());
        if self.options.persist_session {
            self.store(Some(session.clone()));
        }
        self.emit(AuthChangeEvent::SignedIn, Some(session));
    }

    /// Subscribe to session changes
    pub fn on_auth_state_change(&self) -> SessionSubscription {
        SessionSubscription::new(self.changes.subscribe())
    }

    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Session> {
        let url = self.get_auth_url(&format!("/token?grant_type={}", grant_type));

        let session = Fetch::post(&self.client, &url)
            .api_key(&self.key)
            .timeout(self.options.request_timeout)
            .json(&body)?
            .execute::<Session>()
            .await?;

        Ok(session.with_expiry())
    }

    /// Exchange the stored refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Session> {
        let refresh_token = self
            .current_session()
            .map(|s| s.refresh_token)
            .ok_or_else(|| Error::auth("Not logged in"))?;

        let session = self
            .grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;

        if self.options.persist_session {
            self.store(Some(session.clone()));
        }
        self.emit(AuthChangeEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    /// Start a session from a refresh token kept by the caller
    pub async fn restore_session(&self, refresh_token: &str) -> Result<Session> {
        let session = self
            .grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        self.set_session(session.clone());
        Ok(session)
    }

    /// Fetch the user behind the current session, if any
    pub async fn get_user(&self) -> Result<Option<User>> {
        let token = match self.current_session() {
            Some(session) => session.access_token,
            None => return Ok(None),
        };

        let user = self.get_user_by_token(&token).await?;
        Ok(Some(user))
    }

    async fn get_user_by_token(&self, token: &str) -> Result<User> {
        let url = self.get_auth_url("/user");

        Fetch::get(&self.client, &url)
            .api_key(&self.key)
            .bearer_auth(token)
            .timeout(self.options.request_timeout)
            .execute::<User>()
            .await
    }

    /// Build the provider authorization URL
    pub fn get_oauth_sign_in_url(&self, provider: OAuthProvider, options: &OAuthSignInOptions) -> String {
        let mut url = format!("{}?provider={}", self.get_auth_url("/authorize"), provider.as_str());

        if let Some(redirect_to) = &options.redirect_to {
            url.push_str(&format!("&redirect_to={}", urlencoding::encode(redirect_to)));
        }

        if let Some(scopes) = &options.scopes {
            url.push_str(&format!("&scopes={}", urlencoding::encode(scopes)));
        }

        if let Some(challenge) = &options.code_challenge {
            url.push_str(&format!(
                "&code_challenge={}&code_challenge_method={}",
                challenge, CHALLENGE_METHOD
            ));
        }

        url
    }

    /// Start an OAuth sign-in with PKCE.
    ///
    /// Returns the URL the user agent has to visit. The verifier is kept until
    /// the callback code is handed to
    /// [`exchange_code_for_session`](Self::exchange_code_for_session).
    pub async fn sign_in_with_oauth(&self, provider: OAuthProvider, options: OAuthSignInOptions) -> Result<String> {
        if let Some(redirect_to) = &options.redirect_to {
            Url::parse(redirect_to)?;
        }

        let pkce = PkceChallenge::generate();
        let options = OAuthSignInOptions {
            code_challenge: Some(pkce.challenge),
            ..options
        };
        *self.code_verifier.write().unwrap_or_else(PoisonError::into_inner) = Some(pkce.verifier);

        let url = self.get_oauth_sign_in_url(provider, &options);
        info!("OAuth sign-in with {} started", provider.as_str());
        Ok(url)
    }

    /// Verifier of the pending sign-in, for callers that finish it elsewhere
    pub fn code_verifier(&self) -> Option<String> {
        self.code_verifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Exchange the `code` from the OAuth callback for a session
    pub async fn exchange_code_for_session(&self, code: &str) -> Result<Session> {
        let verifier = self
            .code_verifier()
            .ok_or_else(|| Error::auth("No sign-in in progress to exchange a code for"))?;
        self.exchange_code_with_verifier(code, &verifier).await
    }

    /// Exchange a callback `code` using a verifier kept by the caller
    pub async fn exchange_code_with_verifier(&self, code: &str, code_verifier: &str) -> Result<Session> {
        let session = self
            .grant("pkce", json!({ "auth_code": code, "code_verifier": code_verifier }))
            .await?;
        self.code_verifier
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.set_session(session.clone());
        Ok(session)
    }

    /// Read the tokens from an implicit-flow callback URL and start the session
    pub async fn set_session_from_url(&self, callback_url: &str) -> Result<Session> {
        let url = Url::parse(callback_url)?;
        let fragment = url
            .fragment()
            .ok_or_else(|| Error::auth("Callback URL carries no session"))?;

        let pairs: serde_json::Map<String, serde_json::Value> = url::form_urlencoded::parse(fragment.as_bytes())
            .map(|(k, v)| {
                let value: serde_json::Value = match &*k {
                    "expires_in" => v
                        .parse::<i64>()
                        .map(Into::into)
                        .unwrap_or_else(|_| v.to_string().into()),
                    _ => v.to_string().into(),
                };
                (k.into_owned(), value)
            })
            .collect();

        if let Some(error) = pairs.get("error_description").or_else(|| pairs.get("error")) {
            return Err(Error::auth(error.as_str().unwrap_or("OAuth sign-in failed")));
        }

        let tokens: CallbackTokens = serde_json::from_value(pairs.into())
            .map_err(|e| Error::auth(format!("Invalid callback URL: {}", e)))?;

        let user = self.get_user_by_token(&tokens.access_token).await?;
        let session = Session::new(tokens.access_token, tokens.refresh_token, tokens.expires_in, user);
        self.set_session(session.clone());
        Ok(session)
    }

    /// Sign out the current user
    pub async fn sign_out(&self) -> Result<()> {
        let token = match self.current_session() {
            Some(session) => session.access_token,
            None => return Err(Error::auth("Not logged in")),
        };

        let url = self.get_auth_url("/logout");
        let result = Fetch::post(&self.client, &url)
            .api_key(&self.key)
            .bearer_auth(&token)
            .timeout(self.options.request_timeout)
            .execute_checked()
            .await;

        // The local session ends even if the server call failed
        self.store(None);
        info!("Signed out");
        self.emit(AuthChangeEvent::SignedOut, None);

        result.map(|_| ())
    }
}
