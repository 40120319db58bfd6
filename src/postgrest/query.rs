//! Query builders for PostgrestClient

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::fetch::{Fetch, FetchBuilder};
use crate::postgrest::filter::Filter;
use crate::postgrest::types::{Order, RETURN_REPRESENTATION, SINGLE_OBJECT};

/// Everything a request to one table needs
#[derive(Debug, Clone)]
pub(crate) struct TableTarget {
    /// Full URL of the table endpoint
    pub url: String,
    /// The API key
    pub key: String,
    /// Bearer token, the session's access token or the API key
    pub token: String,
    /// Schema, sent as a profile header unless it is `public`
    pub schema: String,
    pub timeout: Option<Duration>,
    pub client: Client,
}

impl TableTarget {
    fn get(&self) -> FetchBuilder<'_> {
        self.with_common(Fetch::get(&self.client, &self.url), "Accept-Profile")
    }

    fn post(&self) -> FetchBuilder<'_> {
        self.with_common(Fetch::post(&self.client, &self.url), "Content-Profile")
    }

    fn with_common<'a>(&self, fetch: FetchBuilder<'a>, profile_header: &str) -> FetchBuilder<'a> {
        let fetch = fetch
            .api_key(&self.key)
            .bearer_auth(&self.token)
            .timeout(self.timeout);

        if self.schema == "public" {
            fetch
        } else {
            fetch.header(profile_header, &self.schema)
        }
    }
}

/// Ordered query parameters
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    params: Vec<(String, String)>,
}

impl QueryBuilder {
    /// Create a new QueryBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing an earlier one with the same key
    pub fn set_param(&mut self, key: &str, value: &str) {
        self.params.retain(|(k, _)| k != key);
        self.add_param(key, value);
    }

    /// Add a parameter to the query
    pub fn add_param(&mut self, key: &str, value: &str) {
        self.params.push((key.to_string(), value.to_string()));
    }

    /// Get the query parameters
    pub fn get_params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Builder for SELECT queries
pub struct SelectBuilder {
    target: TableTarget,
    query: QueryBuilder,
}

impl SelectBuilder {
    pub(crate) fn new(target: TableTarget, columns: &str) -> Self {
        let mut query = QueryBuilder::new();
        query.add_param("select", columns);
        Self { target, query }
    }

    /// Apply a filter
    pub fn filter(mut self, filter: &Filter) -> Self {
        let (column, value) = filter.to_param();
        self.query.add_param(&column, &value);
        self
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(self, column: &str, value: T) -> Self {
        self.filter(&Filter::eq(column, value))
    }

    /// Order the results
    pub fn order(mut self, order: &Order) -> Self {
        self.query.set_param("order", &order.to_param());
        self
    }

    /// The query parameters that will be sent
    pub fn params(&self) -> &[(String, String)] {
        self.query.get_params()
    }

    /// Execute the query and return the rows
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.target
            .get()
            .query(self.query.get_params().to_vec())
            .execute::<Vec<T>>()
            .await
    }

    /// Execute the query expecting exactly one row.
    ///
    /// No match fails with the PostgREST not-found error
    /// (see [`Error::is_not_found`](crate::error::Error::is_not_found)).
    pub async fn single<T: DeserializeOwned>(&self) -> Result<T> {
        self.target
            .get()
            .header("Accept", SINGLE_OBJECT)
            .query(self.query.get_params().to_vec())
            .execute::<T>()
            .await
    }
}

/// Builder for INSERT queries
pub struct InsertBuilder<T: Serialize> {
    target: TableTarget,
    values: T,
}

impl<T: Serialize> InsertBuilder<T> {
    pub(crate) fn new(target: TableTarget, values: T) -> Self {
        Self { target, values }
    }

    /// Execute the insert of one row and return it
    pub async fn single<R: DeserializeOwned>(&self) -> Result<R> {
        self.target
            .post()
            .header("Prefer", RETURN_REPRESENTATION)
            .header("Accept", SINGLE_OBJECT)
            .json(&self.values)?
            .execute::<R>()
            .await
    }
}
