//! Ports to the hosted backend: identity provider, relational store and
//! object storage.
//!
//! Everything the site persists goes through these three traits. The
//! `supabase` adapter talks to the hosted service over HTTP and the
//! server-only SQLite store lives in [`crate::db`]. `memory` is the test
//! double; the app never selects it.

pub mod memory;
pub mod supabase;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::models::session::{AuthUser, Session, SessionEvent, UserMetadata, UserUpdate};

/// A row as exchanged with the relational store: a JSON object.
pub type Row = Value;

/// Errors surfaced by backend adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Network failure or unreachable service.
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },
    /// The service answered with a non-success status.
    #[error("{endpoint} rejected the request with status {status}: {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// A single-row lookup matched nothing.
    #[error("no {what} found")]
    NotFound { what: String },
    /// The response body did not have the expected shape.
    #[error("could not decode response: {message}")]
    Decode { message: String },
    /// Email/password pair was refused by the identity provider.
    #[error("invalid login credentials")]
    InvalidCredentials,
    /// The operation needs a signed-in user.
    #[error("no active session")]
    Unauthenticated,
}

impl BackendError {
    pub fn transport(endpoint: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn rejected(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn decode(message: impl fmt::Display) -> Self {
        Self::Decode {
            message: message.to_string(),
        }
    }
}

/// Tables the site reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Profiles,
    Reviews,
    ProfilePics,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Reviews => "reviews",
            Table::ProfilePics => "profile_pics",
        }
    }

    /// Columns that may appear in queries against this table.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Profiles => &["id", "username", "email", "created_at"],
            Table::Reviews => &["id", "user_id", "username", "rating", "comment", "created_at"],
            Table::ProfilePics => &["user_id", "file_name", "public_url"],
        }
    }

    pub fn has_column(self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row predicate understood by every store.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    /// Case-insensitive match; `%` matches any run of characters.
    ILike(&'static str, String),
    In(&'static str, Vec<Value>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(column, value.into())
    }

    pub fn ilike(column: &'static str, pattern: impl Into<String>) -> Self {
        Filter::ILike(column, pattern.into())
    }

    pub fn is_in<I, V>(column: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(column, values.into_iter().map(Into::into).collect())
    }

    /// Columns referenced by this filter, nested ones included.
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            Filter::Eq(column, _) | Filter::ILike(column, _) | Filter::In(column, _) => {
                vec![*column]
            }
            Filter::Or(filters) => filters.iter().flat_map(Filter::columns).collect(),
        }
    }

    /// Evaluates the filter against a JSON row.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::Eq(column, value) => row.get(*column) == Some(value),
            Filter::ILike(column, pattern) => row
                .get(*column)
                .and_then(Value::as_str)
                .is_some_and(|text| ilike(text, pattern)),
            Filter::In(column, values) => row
                .get(*column)
                .is_some_and(|value| values.contains(value)),
            Filter::Or(filters) => filters.iter().any(|filter| filter.matches(row)),
        }
    }
}

fn ilike(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return text == pattern;
    }

    let mut rest = text.as_str();
    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if index == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if index == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(at) => rest = &rest[at + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

/// A `SELECT` against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: Table,
    /// Empty means every column.
    pub columns: Vec<&'static str>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Select {
    pub fn on(table: Table) -> Self {
        Select {
            table,
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: &'static str, ascending: bool) -> Self {
        self.order = Some(Order { column, ascending });
        self
    }

    /// Rejects column names the table does not have.
    pub fn validate(&self) -> Result<(), BackendError> {
        let unknown = self
            .columns
            .iter()
            .copied()
            .chain(self.filters.iter().flat_map(Filter::columns))
            .chain(self.order.iter().map(|order| order.column))
            .find(|column| !self.table.has_column(column));
        match unknown {
            Some(column) => Err(BackendError::rejected(
                self.table.as_str(),
                400,
                format!("unknown column '{column}'"),
            )),
            None => Ok(()),
        }
    }
}

/// Hosted relational store.
#[async_trait(?Send)]
pub trait RelationalStore {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, BackendError>;

    /// Inserts one row and returns it as stored, generated columns included.
    async fn insert(&self, table: Table, row: Row) -> Result<Row, BackendError>;

    /// Inserts, or merges into the row whose `conflict_key` column matches.
    async fn upsert(&self, table: Table, row: Row, conflict_key: &'static str)
        -> Result<Row, BackendError>;

    /// Merges `patch` into every row matching all `filters`.
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError>;
}

/// Runs `query` and decodes every row into `T`.
pub async fn fetch<T: DeserializeOwned>(
    store: &dyn RelationalStore,
    query: &Select,
) -> Result<Vec<T>, BackendError> {
    store
        .select(query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(BackendError::decode))
        .collect()
}

/// Runs `query` and decodes the first row, if any.
pub async fn fetch_optional<T: DeserializeOwned>(
    store: &dyn RelationalStore,
    query: &Select,
) -> Result<Option<T>, BackendError> {
    Ok(fetch(store, query).await?.into_iter().next())
}

/// Serialises a value into a row.
pub fn to_row<T: serde::Serialize>(value: &T) -> Result<Row, BackendError> {
    serde_json::to_value(value).map_err(BackendError::decode)
}

/// Decodes a row returned by the store.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, BackendError> {
    serde_json::from_value(row).map_err(BackendError::decode)
}

/// Callback invoked on every session change.
pub type SessionCallback = Rc<dyn Fn(&SessionEvent)>;

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    callbacks: Vec<(u64, SessionCallback)>,
}

/// Registry of session-change listeners shared by identity adapters.
#[derive(Clone, Default)]
pub struct SessionListeners {
    inner: Rc<RefCell<ListenerSet>>,
}

impl SessionListeners {
    pub fn subscribe(&self, callback: SessionCallback) -> Subscription {
        let mut set = self.inner.borrow_mut();
        let id = set.next_id;
        set.next_id += 1;
        set.callbacks.push((id, callback));
        Subscription {
            listeners: Rc::downgrade(&self.inner),
            id,
        }
    }

    pub fn notify(&self, event: &SessionEvent) {
        // Listeners may subscribe or unsubscribe while being notified.
        let callbacks: Vec<SessionCallback> = self
            .inner
            .borrow()
            .callbacks
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registration handle for a session-change listener; dropping it
/// unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    listeners: Weak<RefCell<ListenerSet>>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .borrow_mut()
                .callbacks
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Hosted identity provider.
#[async_trait(?Send)]
pub trait IdentityProvider {
    async fn current_session(&self) -> Result<Option<Session>, BackendError>;

    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> Result<AuthUser, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    async fn update_user(&self, update: UserUpdate) -> Result<AuthUser, BackendError>;

    fn on_session_change(&self, callback: SessionCallback) -> Subscription;
}

/// Hosted object storage.
#[async_trait(?Send)]
pub trait ObjectStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), BackendError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// The three ports bundled for the views.
#[derive(Clone)]
pub struct Backend {
    pub identity: Rc<dyn IdentityProvider>,
    pub store: Rc<dyn RelationalStore>,
    pub storage: Rc<dyn ObjectStorage>,
}

impl Backend {
    pub fn supabase(config: &crate::config::SiteConfig) -> Self {
        let client = supabase::SupabaseClient::new(config);
        Backend {
            identity: Rc::new(supabase::SupabaseAuth::new(client.clone())),
            store: Rc::new(supabase::SupabaseStore::new(client.clone())),
            storage: Rc::new(supabase::SupabaseStorage::new(client)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn filters_match_json_rows() {
        let row = json!({"id": 7, "username": "Lakatos", "rating": 4});

        assert!(Filter::eq("id", 7).matches(&row));
        assert!(!Filter::eq("id", 8).matches(&row));
        assert!(Filter::is_in("username", ["x", "Lakatos"]).matches(&row));
        assert!(Filter::ilike("username", "lakatos").matches(&row));
        assert!(Filter::ilike("username", "lak%").matches(&row));
        assert!(Filter::ilike("username", "%tos").matches(&row));
        assert!(!Filter::ilike("username", "%bar%").matches(&row));
        assert!(Filter::Or(vec![Filter::eq("id", 1), Filter::eq("rating", 4)]).matches(&row));
        assert!(!Filter::eq("missing", 1).matches(&row));
    }

    #[test]
    fn select_rejects_unknown_columns() {
        let ok = Select::on(Table::Reviews)
            .columns(&["id", "rating"])
            .order_by("id", false);
        assert!(ok.validate().is_ok());

        let bad = Select::on(Table::ProfilePics).filter(Filter::eq("id", 1));
        assert!(matches!(
            bad.validate(),
            Err(BackendError::Rejected { status: 400, .. })
        ));
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let listeners = SessionListeners::default();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let subscription = listeners.subscribe(Rc::new(move |_: &SessionEvent| {
            counter.set(counter.get() + 1)
        }));

        let event = SessionEvent {
            kind: crate::models::session::SessionEventKind::SignedOut,
            session: None,
        };
        listeners.notify(&event);
        assert_eq!(hits.get(), 1);

        drop(subscription);
        assert!(listeners.is_empty());
        listeners.notify(&event);
        assert_eq!(hits.get(), 1);
    }
}
