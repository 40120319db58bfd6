//! Importz client library
//!
//! Client side of the Importz encargos marketplace: Supabase authentication,
//! profile bootstrap on first sign-in, role-gated dashboard views and the
//! encargo list and create form, all backed by Supabase Auth and PostgREST.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod encargos;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod models;
pub mod postgrest;
pub mod view;

use reqwest::Client;

use crate::auth::Auth;
use crate::config::{ClientOptions, Config};
use crate::error::Result;
use crate::postgrest::PostgrestClient;

/// Connection to one Supabase project
pub struct Supabase {
    /// The base URL for the Supabase project
    url: String,
    /// The API key, anon or service-role
    key: String,
    /// HTTP client used for requests
    http_client: Client,
    /// Auth client holding the session
    auth: Auth,
    /// Client options
    options: ClientOptions,
}

impl Supabase {
    /// Create a new Supabase client
    ///
    /// # Example
    ///
    /// ```
    /// use importz::Supabase;
    ///
    /// let supabase = Supabase::new("https://your-project-url.supabase.co", "your-anon-key");
    /// ```
    pub fn new(supabase_url: &str, supabase_key: &str) -> Self {
        Self::new_with_options(supabase_url, supabase_key, ClientOptions::default())
    }

    /// Create a new Supabase client with custom options
    pub fn new_with_options(supabase_url: &str, supabase_key: &str, options: ClientOptions) -> Self {
        let url = supabase_url.trim_end_matches('/').to_string();
        let http_client = Client::new();
        let auth = Auth::new(&url, supabase_key, http_client.clone(), options.clone());

        Self {
            url,
            key: supabase_key.to_string(),
            http_client,
            auth,
            options,
        }
    }

    /// Public client for the configured project, using the anon key
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.supabase_url, &config.anon_key)
    }

    /// Privileged client using the service-role key.
    ///
    /// Intended for server-side tooling only; it neither keeps nor refreshes a
    /// user session.
    pub fn admin(config: &Config) -> Result<Self> {
        let key = config.require_service_role_key()?;
        let options = ClientOptions::default()
            .with_auto_refresh_token(false)
            .with_persist_session(false);
        Ok(Self::new_with_options(&config.supabase_url, key, options))
    }

    /// The base URL of the project
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The auth client
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Query a table, authenticated as the current session user if there is one
    pub fn from(&self, table: &str) -> PostgrestClient {
        let token = self.auth.current_session().map(|s| s.access_token);
        PostgrestClient::new(
            &self.url,
            &self.key,
            token.as_deref(),
            table,
            self.http_client.clone(),
            &self.options,
        )
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::bootstrap::{AuthState, AuthView};
    pub use crate::config::{ClientOptions, Config};
    pub use crate::encargos::{CreateEncargoForm, EncargoList, ListKey};
    pub use crate::error::{Error, Result};
    pub use crate::gateway::Gateway;
    pub use crate::models::{Encargo, EncargoStatus, Profile, UserRole};
    pub use crate::view::View;
    pub use crate::Supabase;
}
