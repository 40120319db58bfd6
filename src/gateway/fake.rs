//! In-memory gateway for component tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, Notify};

use super::{Gateway, SelectQuery};
use crate::auth::{AuthChangeEvent, OAuthProvider, Session, SessionChange, SessionSubscription, User};
use crate::error::{Error, Result, NOT_FOUND_CODE};
use crate::postgrest::Filter;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn user(id: &str, email: &str, full_name: Option<&str>) -> User {
    User {
        id: id.to_string(),
        email: Some(email.to_string()),
        user_metadata: match full_name {
            Some(name) => json!({ "full_name": name, "avatar_url": "https://example.com/a.png" }),
            None => json!({}),
        },
        ..Default::default()
    }
}

pub(crate) fn session_for(user: User) -> Session {
    Session::new(format!("token-{}", user.id), "refresh".to_string(), 3600, user)
}

pub(crate) fn profile_row(id: &str, email: &str, full_name: Option<&str>, role: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "full_name": full_name,
        "avatar_url": null,
        "role": role,
        "created_at": "2025-05-29T23:04:00Z",
        "updated_at": "2025-05-29T23:04:00Z"
    })
}

pub(crate) fn encargo_row(id: &str, comprador_id: &str, status: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "comprador_id": comprador_id,
        "product_name": format!("Producto {}", id),
        "product_url": null,
        "quantity": 1,
        "description": null,
        "estimated_price": null,
        "image_url": null,
        "category": null,
        "status": status,
        "created_at": created_at,
        "updated_at": created_at,
        "comprador": profile_row(comprador_id, &format!("{}@example.com", comprador_id), None, "comprador")
    })
}

/// Scriptable backend: tables are JSON rows, failures and delays are opt-in
#[derive(Default)]
pub(crate) struct FakeGateway {
    session: Mutex<Option<Session>>,
    current_user: Mutex<Option<User>>,
    changes: Mutex<Option<broadcast::Sender<SessionChange>>>,
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failing_tables: Mutex<HashMap<String, String>>,
    failing_inserts: Mutex<bool>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    pub inserts: Mutex<Vec<(String, Value)>>,
    pub selects: Mutex<Vec<(String, SelectQuery)>>,
    pub lookups: AtomicUsize,
    pub sign_ins: Mutex<Vec<(OAuthProvider, String)>>,
    pub sign_outs: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self) -> broadcast::Sender<SessionChange> {
        lock(&self.changes)
            .get_or_insert_with(|| broadcast::channel(16).0)
            .clone()
    }

    pub fn with_session(self, user: User) -> Self {
        *lock(&self.current_user) = Some(user.clone());
        *lock(&self.session) = Some(session_for(user));
        self
    }

    pub fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
        lock(&self.tables).insert(table.to_string(), rows);
        self
    }

    /// Make reads of `table` fail with a PostgREST error carrying `code`
    pub fn failing(self, table: &str, code: &str) -> Self {
        self.fail_reads(table, code);
        self
    }

    /// Same as [`failing`](Self::failing) on a gateway already in use
    pub fn fail_reads(&self, table: &str, code: &str) {
        lock(&self.failing_tables).insert(table.to_string(), code.to_string());
    }

    pub fn failing_inserts(self) -> Self {
        *lock(&self.failing_inserts) = true;
        self
    }

    /// Park requests keyed by `key` until the returned notify fires.
    ///
    /// Keys are a profile id for `select_one`, a filter value for
    /// `select_many` and `insert:<table>` for inserts.
    pub fn hold(&self, key: &str) -> Arc<Notify> {
        lock(&self.gates)
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    async fn pass_gate(&self, key: &str) {
        let gate = lock(&self.gates).get(key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    /// Change the session and notify subscribers
    pub fn emit(&self, user: Option<User>) {
        let session = user.map(session_for);
        *lock(&self.current_user) = session.as_ref().map(|s| s.user.clone());
        *lock(&self.session) = session.clone();
        let event = if session.is_some() {
            AuthChangeEvent::SignedIn
        } else {
            AuthChangeEvent::SignedOut
        };
        let _ = self.sender().send(SessionChange { event, session });
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender().receiver_count()
    }

    fn fail_for(&self, table: &str) -> Result<()> {
        match lock(&self.failing_tables).get(table) {
            Some(code) => Err(Error::Postgrest {
                status: 400,
                code: code.clone(),
                message: "scripted failure".to_string(),
                details: None,
                hint: None,
            }),
            None => Ok(()),
        }
    }
}

fn row_matches(row: &Value, filter: &Filter) -> bool {
    row.get(&filter.column).and_then(Value::as_str) == Some(filter.value.as_str())
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(lock(&self.session).clone())
    }

    fn on_session_change(&self) -> SessionSubscription {
        SessionSubscription::new(self.sender().subscribe())
    }

    async fn sign_in_with_provider(&self, provider: OAuthProvider, redirect_to: &str) -> Result<String> {
        lock(&self.sign_ins).push((provider, redirect_to.to_string()));
        Ok(format!(
            "https://fake.supabase.co/auth/v1/authorize?provider={}&redirect_to={}",
            provider.as_str(),
            urlencoding::encode(redirect_to)
        ))
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.emit(None);
        Ok(())
    }

    async fn get_current_user(&self) -> Result<Option<User>> {
        Ok(lock(&self.current_user).clone())
    }

    async fn select_one(&self, table: &str, filters: &[Filter]) -> Result<Value> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(filter) = filters.first() {
            self.pass_gate(&filter.value).await;
        }
        self.fail_for(table)?;

        let found: Vec<Value> = lock(&self.tables)
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filters.iter().all(|f| row_matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        match found.len() {
            1 => Ok(found.into_iter().next().unwrap_or_default()),
            n => Err(Error::Postgrest {
                status: 406,
                code: NOT_FOUND_CODE.to_string(),
                message: "JSON object requested, multiple (or no) rows returned".to_string(),
                details: Some(format!("The result contains {} rows", n)),
                hint: None,
            }),
        }
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        lock(&self.inserts).push((table.to_string(), row.clone()));
        self.pass_gate(&format!("insert:{}", table)).await;

        if *lock(&self.failing_inserts) {
            return Err(Error::Postgrest {
                status: 403,
                code: "42501".to_string(),
                message: "new row violates row-level security policy".to_string(),
                details: None,
                hint: None,
            });
        }

        let mut stored = row;
        if let Some(object) = stored.as_object_mut() {
            let count = lock(&self.inserts).len();
            object.entry("id").or_insert_with(|| json!(format!("row-{}", count)));
            object.entry("created_at").or_insert_with(|| json!("2025-06-01T12:00:00Z"));
            object.entry("updated_at").or_insert_with(|| json!("2025-06-01T12:00:00Z"));
            if table == "encargos" {
                object.entry("status").or_insert_with(|| json!("pendiente_cotizacion"));
                object.entry("image_url").or_insert(Value::Null);
            }
        }

        lock(&self.tables)
            .entry(table.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn select_many(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>> {
        lock(&self.selects).push((table.to_string(), query.clone()));
        if let Some(filter) = query.filters.first() {
            self.pass_gate(&filter.value).await;
        }
        self.fail_for(table)?;

        let mut rows: Vec<Value> = lock(&self.tables)
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| row_matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let a = a.get(&order.column).and_then(Value::as_str).unwrap_or_default();
                let b = b.get(&order.column).and_then(Value::as_str).unwrap_or_default();
                if order.ascending {
                    a.cmp(b)
                } else {
                    b.cmp(a)
                }
            });
        }

        Ok(rows)
    }
}
