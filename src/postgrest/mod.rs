//! Table access through the PostgREST API

mod filter;
mod query;
mod types;

use reqwest::Client;
use serde::Serialize;

use crate::config::ClientOptions;

pub use filter::*;
pub use query::*;
pub use types::*;

use query::TableTarget;

/// Client for one table or view
pub struct PostgrestClient {
    target: TableTarget,
}

impl PostgrestClient {
    /// Create a new PostgrestClient.
    ///
    /// `token` is the bearer token to send; without a session it is the API key.
    pub(crate) fn new(
        url: &str,
        key: &str,
        token: Option<&str>,
        table: &str,
        client: Client,
        options: &ClientOptions,
    ) -> Self {
        Self {
            target: TableTarget {
                url: format!("{}/rest/v1/{}", url, table),
                key: key.to_string(),
                token: token.unwrap_or(key).to_string(),
                schema: options.db_schema.clone(),
                timeout: options.request_timeout,
                client,
            },
        }
    }

    /// Select columns from the table; embedded resources use PostgREST syntax
    pub fn select(&self, columns: &str) -> SelectBuilder {
        SelectBuilder::new(self.target.clone(), columns)
    }

    /// Insert data into the table
    pub fn insert<T: Serialize>(&self, values: T) -> InsertBuilder<T> {
        InsertBuilder::new(self.target.clone(), values)
    }
}
