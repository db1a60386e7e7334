//! In-process test double for the backend ports.
//!
//! Keeps the same contracts as the hosted service so unit and integration
//! tests can drive the review pipeline and account flows without a network.
//! It is public only so the integration tests under `tests/` can reach it. Every port method that would be a
//! remote call bumps a shared counter, and individual operations can be made
//! to fail on demand.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{
    Backend, BackendError, Filter, IdentityProvider, ObjectStorage, RelationalStore, Row, Select,
    SessionCallback, SessionListeners, Subscription, Table,
};
use crate::models::session::{
    AuthUser, Session, SessionEvent, SessionEventKind, UserMetadata, UserUpdate,
};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Upsert,
    Update,
}

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<Table, Vec<Row>>,
    next_review_id: i64,
}

/// Relational store backed by JSON rows in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failures: Mutex<HashSet<(Table, Operation)>>,
    calls: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_counter(calls: Arc<AtomicUsize>) -> Self {
        MemoryStore {
            calls,
            ..Self::default()
        }
    }

    /// Adds a row without counting it as a remote call.
    pub fn seed(&self, table: Table, row: Row) {
        let mut tables = self.lock_tables();
        if table == Table::Reviews {
            if let Some(id) = row.get("id").and_then(Value::as_i64) {
                tables.next_review_id = tables.next_review_id.max(id);
            }
        }
        tables.rows.entry(table).or_default().push(row);
    }

    /// Makes every later `operation` on `table` fail with a 503.
    pub fn fail_on(&self, table: Table, operation: Operation) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert((table, operation));
        }
    }

    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.lock_tables()
            .rows
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, table: Table, operation: Operation) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .lock()
            .map(|failures| failures.contains(&(table, operation)))
            .unwrap_or(false);
        if failing {
            return Err(BackendError::rejected(
                table.as_str(),
                503,
                format!("{operation:?} disabled"),
            ));
        }
        Ok(())
    }
}

fn merge(target: &mut Row, patch: &Row) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn project(row: &Row, columns: &[&'static str]) -> Row {
    if columns.is_empty() {
        return row.clone();
    }
    let mut projected = Map::new();
    for column in columns {
        if let Some(value) = row.get(*column) {
            projected.insert((*column).to_string(), value.clone());
        }
    }
    Value::Object(projected)
}

fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Null, Value::Null) => std::cmp::Ordering::Equal,
        (Value::Null, _) => std::cmp::Ordering::Less,
        (_, Value::Null) => std::cmp::Ordering::Greater,
        _ => std::cmp::Ordering::Equal,
    }
}

#[async_trait(?Send)]
impl RelationalStore for MemoryStore {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, BackendError> {
        self.enter(query.table, Operation::Select)?;
        query.validate()?;

        let tables = self.lock_tables();
        let mut rows: Vec<Row> = tables
            .rows
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|filter| filter.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = query.order {
            rows.sort_by(|a, b| {
                let null = Value::Null;
                let ordering = compare(
                    a.get(order.column).unwrap_or(&null),
                    b.get(order.column).unwrap_or(&null),
                );
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        Ok(rows
            .iter()
            .map(|row| project(row, &query.columns))
            .collect())
    }

    async fn insert(&self, table: Table, mut row: Row) -> Result<Row, BackendError> {
        self.enter(table, Operation::Insert)?;
        if !row.is_object() {
            return Err(BackendError::rejected(table.as_str(), 400, "row must be an object"));
        }

        let mut tables = self.lock_tables();
        if table == Table::Reviews {
            tables.next_review_id += 1;
            merge(
                &mut row,
                &json!({ "id": tables.next_review_id, "created_at": Utc::now() }),
            );
        }
        if table == Table::Profiles {
            let taken = row.get("username").is_some_and(|name| {
                tables
                    .rows
                    .get(&table)
                    .is_some_and(|rows| rows.iter().any(|r| r.get("username") == Some(name)))
            });
            if taken {
                return Err(BackendError::rejected(table.as_str(), 409, "duplicate username"));
            }
        }
        tables.rows.entry(table).or_default().push(row.clone());
        Ok(row)
    }

    async fn upsert(
        &self,
        table: Table,
        row: Row,
        conflict_key: &'static str,
    ) -> Result<Row, BackendError> {
        self.enter(table, Operation::Upsert)?;
        let key = row.get(conflict_key).cloned().ok_or_else(|| {
            BackendError::rejected(table.as_str(), 400, format!("missing '{conflict_key}'"))
        })?;

        let mut tables = self.lock_tables();
        let rows = tables.rows.entry(table).or_default();
        match rows.iter().position(|r| r.get(conflict_key) == Some(&key)) {
            Some(index) => {
                let existing = &mut rows[index];
                merge(existing, &row);
                Ok(existing.clone())
            }
            None => {
                rows.push(row.clone());
                Ok(row)
            }
        }
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError> {
        self.enter(table, Operation::Update)?;
        let mut tables = self.lock_tables();
        let mut updated = Vec::new();
        for row in tables.rows.entry(table).or_default().iter_mut() {
            if filters.iter().all(|filter| filter.matches(row)) {
                merge(row, &patch);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }
}

#[derive(Debug, Clone)]
struct Account {
    user: AuthUser,
    password: String,
}

/// Identity provider holding accounts and the current session in memory.
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<Session>>,
    listeners: SessionListeners,
    calls: Arc<AtomicUsize>,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::with_counter(Arc::default())
    }
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_counter(calls: Arc<AtomicUsize>) -> Self {
        MemoryIdentity {
            accounts: Mutex::default(),
            session: Mutex::default(),
            listeners: SessionListeners::default(),
            calls,
        }
    }

    /// Registers an account without counting a remote call.
    pub fn add_account(&self, email: &str, password: &str, username: &str) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: UserMetadata {
                username: Some(username.to_string()),
            },
        };
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                email.to_string(),
                Account {
                    user: user.clone(),
                    password: password.to_string(),
                },
            );
        }
        user
    }

    /// Number of live session-change subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn set_session(&self, session: Option<Session>, kind: SessionEventKind) {
        if let Ok(mut current) = self.session.lock() {
            current.clone_from(&session);
        }
        self.listeners.notify(&SessionEvent { kind, session });
    }

    fn open_session(&self, user: AuthUser) -> Session {
        let session = Session {
            access_token: format!("memory-{}", Uuid::new_v4()),
            refresh_token: None,
            expires_at: None,
            user,
        };
        self.set_session(Some(session.clone()), SessionEventKind::SignedIn);
        session
    }

    fn snapshot(&self) -> Option<Session> {
        self.session.lock().ok().and_then(|session| session.clone())
    }
}

#[async_trait(?Send)]
impl IdentityProvider for MemoryIdentity {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        self.count();
        Ok(self.snapshot())
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
        self.count();
        Ok(self.snapshot().map(|session| session.user))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        self.count();
        let user = self
            .accounts
            .lock()
            .ok()
            .and_then(|accounts| accounts.get(email).cloned())
            .filter(|account| account.password == password)
            .map(|account| account.user)
            .ok_or(BackendError::InvalidCredentials)?;
        Ok(self.open_session(user))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> Result<AuthUser, BackendError> {
        self.count();
        let exists = self
            .accounts
            .lock()
            .map(|accounts| accounts.contains_key(email))
            .unwrap_or(false);
        if exists {
            return Err(BackendError::rejected("signup", 422, "User already registered"));
        }
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: metadata,
        };
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                email.to_string(),
                Account {
                    user: user.clone(),
                    password: password.to_string(),
                },
            );
        }
        self.open_session(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.count();
        self.set_session(None, SessionEventKind::SignedOut);
        Ok(())
    }

    async fn update_user(&self, update: UserUpdate) -> Result<AuthUser, BackendError> {
        self.count();
        let mut session = self.snapshot().ok_or(BackendError::Unauthenticated)?;
        let old_email = session.user.email.clone().unwrap_or_default();
        if let Some(email) = update.email {
            session.user.email = Some(email);
        }
        if let Some(metadata) = update.metadata {
            session.user.user_metadata = metadata;
        }

        if let Ok(mut accounts) = self.accounts.lock() {
            if let Some(mut account) = accounts.remove(&old_email) {
                account.user = session.user.clone();
                let key = account.user.email.clone().unwrap_or_default();
                accounts.insert(key, account);
            }
        }
        let user = session.user.clone();
        self.set_session(Some(session), SessionEventKind::UserUpdated);
        Ok(user)
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        self.listeners.subscribe(callback)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Object storage keeping uploads in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    calls: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(&(bucket.to_string(), path.to_string())).cloned())
    }
}

#[async_trait(?Send)]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| BackendError::transport("storage", "storage lock poisoned"))?;
        let key = (bucket.to_string(), path.to_string());
        if !upsert && objects.contains_key(&key) {
            return Err(BackendError::rejected("storage", 409, "The resource already exists"));
        }
        objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{bucket}/{}", urlencoding::encode(path))
    }
}

/// All three in-memory ports sharing one remote-call counter.
#[derive(Clone)]
pub struct MemoryBackend {
    pub identity: Rc<MemoryIdentity>,
    pub store: Rc<MemoryStore>,
    pub storage: Rc<MemoryStorage>,
    calls: Arc<AtomicUsize>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        MemoryBackend {
            identity: Rc::new(MemoryIdentity::with_counter(Arc::clone(&calls))),
            store: Rc::new(MemoryStore::with_counter(Arc::clone(&calls))),
            storage: Rc::new(MemoryStorage {
                objects: Mutex::default(),
                calls: Arc::clone(&calls),
            }),
            calls,
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote calls issued through any of the three ports.
    pub fn remote_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn backend(&self) -> Backend {
        Backend {
            identity: self.identity.clone(),
            store: self.store.clone(),
            storage: self.storage.clone(),
        }
    }
}
