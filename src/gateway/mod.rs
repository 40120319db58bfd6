//! The backend seam used by the components
//!
//! Components talk to the backend only through [`Gateway`]. Rows cross the seam
//! as JSON and are decoded by the caller, which keeps the trait object-safe and
//! easy to fake.

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::{OAuthProvider, OAuthSignInOptions, Session, SessionSubscription, User};
use crate::error::Result;
use crate::postgrest::{Filter, Order};
use crate::Supabase;

/// A read of many rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    /// Columns, including embedded relations
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl SelectQuery {
    pub fn new(columns: &str) -> Self {
        Self {
            columns: columns.to_string(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }
}

/// Session and row access needed by the components
#[async_trait]
pub trait Gateway: Send + Sync {
    /// The current session, if any
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Subscribe to session changes
    fn on_session_change(&self) -> SessionSubscription;

    /// Start an OAuth sign-in; returns the URL to send the user to
    async fn sign_in_with_provider(&self, provider: OAuthProvider, redirect_to: &str) -> Result<String>;

    async fn sign_out(&self) -> Result<()>;

    /// The user behind the current session, fetched from the auth server
    async fn get_current_user(&self) -> Result<Option<User>>;

    /// Exactly one row matching `filters`; no match is a not-found error
    async fn select_one(&self, table: &str, filters: &[Filter]) -> Result<Value>;

    /// Insert one row and return it as stored
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    async fn select_many(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>>;
}

/// Decode a row returned through the gateway
pub fn decode<T: DeserializeOwned>(row: Value) -> Result<T> {
    Ok(serde_json::from_value(row)?)
}

/// Decode a list of rows returned through the gateway
pub fn decode_all<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter().map(decode).collect()
}

#[async_trait]
impl Gateway for Supabase {
    async fn get_session(&self) -> Result<Option<Session>> {
        self.auth().get_session().await
    }

    fn on_session_change(&self) -> SessionSubscription {
        self.auth().on_auth_state_change()
    }

    async fn sign_in_with_provider(&self, provider: OAuthProvider, redirect_to: &str) -> Result<String> {
        let options = OAuthSignInOptions {
            redirect_to: Some(redirect_to.to_string()),
            ..Default::default()
        };
        self.auth().sign_in_with_oauth(provider, options).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.auth().sign_out().await
    }

    async fn get_current_user(&self) -> Result<Option<User>> {
        self.auth().get_user().await
    }

    async fn select_one(&self, table: &str, filters: &[Filter]) -> Result<Value> {
        let select = filters
            .iter()
            .fold(self.from(table).select("*"), |select, filter| select.filter(filter));
        select.single().await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        self.from(table).insert(row).single().await
    }

    async fn select_many(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>> {
        let mut select = query
            .filters
            .iter()
            .fold(self.from(table).select(&query.columns), |select, filter| select.filter(filter));

        if let Some(order) = &query.order {
            select = select.order(order);
        }

        select.execute().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_query_builder() {
        let query = SelectQuery::new("*")
            .filter(Filter::eq("comprador_id", "U1"))
            .order(Order::desc("created_at"));

        assert_eq!(query.columns, "*");
        assert_eq!(query.filters, vec![Filter::eq("comprador_id", "U1")]);
        assert_eq!(query.order, Some(Order::desc("created_at")));
    }

    #[test]
    fn decode_reports_bad_rows() {
        let ok: Vec<crate::models::UserRole> = decode_all(vec![json!("admin")]).unwrap();
        assert_eq!(ok, vec![crate::models::UserRole::Admin]);
        assert!(decode::<crate::models::Profile>(json!({ "id": 1 })).is_err());
    }
}
