//! Configuration for the Importz client

use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable holding the Supabase project URL
pub const URL_VAR: &str = "SUPABASE_URL";
/// Environment variable holding the public anon key
pub const ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";
/// Environment variable holding the service-role key
pub const SERVICE_ROLE_KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";
/// Environment variable holding the public site URL used for OAuth callbacks
pub const SITE_URL_VAR: &str = "IMPORTZ_SITE_URL";

const DEFAULT_SITE_URL: &str = "http://localhost:3000";

/// Path the identity provider redirects back to after sign-in
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Configuration options for the Supabase client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Whether to automatically refresh an expired token
    pub auto_refresh_token: bool,

    /// Whether to keep the session in memory after sign-in
    pub persist_session: bool,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The database schema
    pub db_schema: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
        }
    }
}

impl ClientOptions {
    /// Set whether to automatically refresh the token
    pub fn with_auto_refresh_token(mut self, value: bool) -> Self {
        self.auto_refresh_token = value;
        self
    }

    /// Set whether to persist the session
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }
}

/// Project settings read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// The base URL for the Supabase project
    pub supabase_url: String,

    /// The public anon key
    pub anon_key: String,

    /// The service-role key, only needed for admin clients
    pub service_role_key: Option<String>,

    /// The public origin of the site, used to build the OAuth callback URL
    pub site_url: String,
}

impl Config {
    /// Load the configuration from the process environment and `.env`
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let (supabase_url, anon_key) = match (non_empty(URL_VAR), non_empty(ANON_KEY_VAR)) {
            (Some(url), Some(key)) => (url, key),
            _ => {
                return Err(Error::config(format!(
                    "Missing Supabase environment variables. Please set {} and {}.",
                    URL_VAR, ANON_KEY_VAR
                )))
            }
        };

        let site_url = non_empty(SITE_URL_VAR).unwrap_or_else(|| DEFAULT_SITE_URL.to_string());

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            anon_key,
            service_role_key: non_empty(SERVICE_ROLE_KEY_VAR),
            site_url: site_url.trim_end_matches('/').to_string(),
        })
    }

    /// The URL the identity provider should redirect to after sign-in
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.site_url, CALLBACK_PATH)
    }

    /// The service-role key, or an error if it is not configured
    pub fn require_service_role_key(&self) -> Result<&str> {
        self.service_role_key
            .as_deref()
            .ok_or_else(|| Error::config(format!("Missing {} environment variable", SERVICE_ROLE_KEY_VAR)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn loads_required_variables() {
        let config = Config::from_lookup(lookup(&[
            (URL_VAR, "https://abc.supabase.co/"),
            (ANON_KEY_VAR, "anon"),
        ]))
        .unwrap();

        assert_eq!(config.supabase_url, "https://abc.supabase.co");
        assert_eq!(config.anon_key, "anon");
        assert!(config.service_role_key.is_none());
        assert_eq!(config.callback_url(), "http://localhost:3000/auth/callback");
    }

    #[test]
    fn missing_anon_key_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[(URL_VAR, "https://abc.supabase.co")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("Missing Supabase environment variables")));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = Config::from_lookup(lookup(&[(URL_VAR, " "), (ANON_KEY_VAR, "anon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn service_role_key_is_only_required_on_demand() {
        let config = Config::from_lookup(lookup(&[
            (URL_VAR, "https://abc.supabase.co"),
            (ANON_KEY_VAR, "anon"),
            (SITE_URL_VAR, "https://importz.app/"),
        ]))
        .unwrap();
        assert!(config.require_service_role_key().is_err());
        assert_eq!(config.callback_url(), "https://importz.app/auth/callback");

        let config = Config::from_lookup(lookup(&[
            (URL_VAR, "https://abc.supabase.co"),
            (ANON_KEY_VAR, "anon"),
            (SERVICE_ROLE_KEY_VAR, "service"),
        ]))
        .unwrap();
        assert_eq!(config.require_service_role_key().unwrap(), "service");
    }

    #[test]
    fn options_builder() {
        let options = ClientOptions::default()
            .with_auto_refresh_token(false)
            .with_persist_session(false)
            .with_request_timeout(None)
            .with_db_schema("importz");
        assert!(!options.auto_refresh_token);
        assert!(!options.persist_session);
        assert!(options.request_timeout.is_none());
        assert_eq!(options.db_schema, "importz");
    }
}
