//! Error handling for the Importz client

use std::fmt;
use thiserror::Error;

/// PostgREST code for a single-object request that matched no rows
pub const NOT_FOUND_CODE: &str = "PGRST116";

/// Unified error type for the Importz client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Error body returned by the PostgREST API
    #[error("Database error {code} (HTTP {status}): {message}")]
    Postgrest {
        status: u16,
        code: String,
        message: String,
        details: Option<String>,
        hint: Option<String>,
    },

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected before any request was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new validation error
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// Whether a single-row lookup matched nothing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Postgrest { code, .. } if code == NOT_FOUND_CODE)
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
