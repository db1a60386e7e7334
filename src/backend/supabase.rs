//! Supabase adapters: PostgREST for rows, GoTrue for auth, Storage for files.
//!
//! All three share one [`SupabaseClient`], which carries the anon key and,
//! once someone signs in, their access token so row-level security sees the
//! right user. A token the server rejects is retried once as anonymous, and
//! an expired stored session is refreshed before it is handed out.

use std::cell::RefCell;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use leptos::logging::{error, log, warn};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    BackendError, Filter, IdentityProvider, ObjectStorage, RelationalStore, Row, Select,
    SessionCallback, SessionListeners, Subscription, Table,
};
use crate::config::SiteConfig;
use crate::models::session::{
    AuthUser, Session, SessionEvent, SessionEventKind, UserMetadata, UserUpdate,
};

/// HTTP plumbing shared by the Supabase adapters.
#[derive(Clone, Debug)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl SupabaseClient {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            access_token: Arc::default(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut current) = self.access_token.write() {
            *current = token;
        }
    }

    fn has_user_token(&self) -> bool {
        self.access_token
            .read()
            .map(|token| token.is_some())
            .unwrap_or(false)
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .ok()
            .and_then(|token| token.clone())
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    /// Replaces the user's bearer with the anon key.
    fn with_anon_bearer(&self, mut request: Request) -> Result<Request, BackendError> {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.anon_key))
            .map_err(|e| BackendError::transport("auth header", e))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        Ok(request)
    }

    async fn execute(&self, endpoint: &str, request: Request) -> Result<Response, BackendError> {
        self.http
            .execute(request)
            .await
            .map_err(|e| BackendError::transport(endpoint, e))
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, BackendError> {
        let request = request
            .build()
            .map_err(|e| BackendError::transport(endpoint, e))?;
        let retry = if self.has_user_token() {
            request.try_clone()
        } else {
            None
        };

        let mut response = self.execute(endpoint, request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(retry) = retry {
                warn!("[AUTH] {endpoint} rejected the access token, retrying anonymously");
                response = self.execute(endpoint, self.with_anon_bearer(retry)?).await?;
            }
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::rejected(endpoint, status.as_u16(), error_message(&body)))
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        self.send(endpoint, request)
            .await?
            .json::<T>()
            .await
            .map_err(BackendError::decode)
    }
}

/// Pulls the human-readable message out of a PostgREST or GoTrue error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

/// Renders a value inside a PostgREST filter.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn render_condition(filter: &Filter) -> String {
    match filter {
        Filter::Eq(column, value) => format!("{column}.eq.{}", render_value(value)),
        Filter::ILike(column, pattern) => format!("{column}.ilike.{}", pattern.replace('%', "*")),
        Filter::In(column, values) => format!(
            "{column}.in.({})",
            values.iter().map(render_value).collect::<Vec<_>>().join(",")
        ),
        Filter::Or(filters) => format!(
            "or({})",
            filters.iter().map(render_condition).collect::<Vec<_>>().join(",")
        ),
    }
}

/// Turns a filter into one PostgREST query parameter.
fn query_param(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(column, value) => {
            let rendered = match value {
                Value::String(text) => text.clone(),
                other => render_value(other),
            };
            (column.to_string(), format!("eq.{rendered}"))
        }
        Filter::ILike(column, pattern) => (
            column.to_string(),
            format!("ilike.{}", pattern.replace('%', "*")),
        ),
        Filter::In(column, values) => (
            column.to_string(),
            format!(
                "in.({})",
                values.iter().map(render_value).collect::<Vec<_>>().join(",")
            ),
        ),
        Filter::Or(filters) => (
            "or".to_string(),
            format!(
                "({})",
                filters.iter().map(render_condition).collect::<Vec<_>>().join(",")
            ),
        ),
    }
}

fn select_params(query: &Select) -> Vec<(String, String)> {
    let columns = if query.columns.is_empty() {
        "*".to_string()
    } else {
        query.columns.join(",")
    };
    let mut params = vec![("select".to_string(), columns)];
    params.extend(query.filters.iter().map(query_param));
    if let Some(order) = query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }
    params
}

/// PostgREST-backed [`RelationalStore`].
#[derive(Clone, Debug)]
pub struct SupabaseStore {
    client: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn table_path(table: Table) -> String {
        format!("/rest/v1/{}", table.as_str())
    }

    async fn write_one(&self, table: Table, request: RequestBuilder) -> Result<Row, BackendError> {
        let rows: Vec<Row> = self.client.send_json(table.as_str(), request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(format!("{table} row in write response")))
    }
}

#[async_trait(?Send)]
impl RelationalStore for SupabaseStore {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, BackendError> {
        query.validate()?;
        let request = self
            .client
            .request(Method::GET, &Self::table_path(query.table))
            .query(&select_params(query));
        self.client.send_json(query.table.as_str(), request).await
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, BackendError> {
        let request = self
            .client
            .request(Method::POST, &Self::table_path(table))
            .header("Prefer", "return=representation")
            .json(&row);
        self.write_one(table, request).await
    }

    async fn upsert(
        &self,
        table: Table,
        row: Row,
        conflict_key: &'static str,
    ) -> Result<Row, BackendError> {
        let request = self
            .client
            .request(Method::POST, &Self::table_path(table))
            .query(&[("on_conflict", conflict_key)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row);
        self.write_one(table, request).await
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError> {
        let params: Vec<(String, String)> = filters.iter().map(query_param).collect();
        let request = self
            .client
            .request(Method::PATCH, &Self::table_path(table))
            .query(&params)
            .header("Prefer", "return=representation")
            .json(&patch);
        self.client.send_json(table.as_str(), request).await
    }
}

#[cfg(target_arch = "wasm32")]
mod persistence {
    use leptos::logging::warn;

    use crate::models::session::Session;

    const SESSION_KEY: &str = "xcape.session";

    fn local_storage() -> Option<web_sys::Storage> {
        web_sys::window().and_then(|window| window.local_storage().ok().flatten())
    }

    pub fn load() -> Option<Session> {
        let raw = local_storage()?.get_item(SESSION_KEY).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn store(session: Option<&Session>) {
        let Some(storage) = local_storage() else {
            return;
        };
        let outcome = match session.and_then(|s| serde_json::to_string(s).ok()) {
            Some(raw) => storage.set_item(SESSION_KEY, &raw),
            None => storage.remove_item(SESSION_KEY),
        };
        if let Err(e) = outcome {
            warn!("[AUTH] Could not persist the session: {e:?}");
        }
    }

}

#[cfg(not(target_arch = "wasm32"))]
mod persistence {
    use crate::models::session::Session;

    pub fn load() -> Option<Session> {
        None
    }

    pub fn store(_session: Option<&Session>) {}
}

/// Body of a successful `/token` grant.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: expiry(self.expires_at, self.expires_in, now),
            user: self.user,
        }
    }
}

fn expiry(expires_at: Option<i64>, expires_in: Option<i64>, now: i64) -> Option<i64> {
    expires_at.or_else(|| expires_in.map(|seconds| now + seconds))
}

#[derive(Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<AuthUser>,
    #[serde(flatten)]
    rest: Value,
}

/// GoTrue-backed [`IdentityProvider`]. Session changes made through this
/// client are broadcast to subscribers and kept in local storage.
pub struct SupabaseAuth {
    client: SupabaseClient,
    session: RefCell<Option<Session>>,
    listeners: SessionListeners,
}

impl SupabaseAuth {
    pub fn new(client: SupabaseClient) -> Self {
        Self::with_session(client, persistence::load())
    }

    fn with_session(client: SupabaseClient, session: Option<Session>) -> Self {
        let now = Utc::now().timestamp();
        client.set_access_token(
            session
                .as_ref()
                .filter(|s| !s.is_expired(now))
                .map(|s| s.access_token.clone()),
        );
        Self {
            client,
            session: RefCell::new(session),
            listeners: SessionListeners::default(),
        }
    }

    fn replace_session(&self, session: Option<Session>, kind: SessionEventKind) {
        self.client
            .set_access_token(session.as_ref().map(|s| s.access_token.clone()));
        persistence::store(session.as_ref());
        self.session.replace(session.clone());
        self.listeners.notify(&SessionEvent { kind, session });
    }

    /// Trades the refresh token for a new session. Any failure drops the
    /// stored session, since its access token is no longer usable.
    async fn refresh(&self, session: Session) -> Option<Session> {
        let Some(refresh_token) = session.refresh_token else {
            warn!("[AUTH] Stored session expired without a refresh token, signing out");
            self.replace_session(None, SessionEventKind::SignedOut);
            return None;
        };
        self.client.set_access_token(None);
        let request = self
            .client
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        match self.client.send_json::<TokenResponse>("token", request).await {
            Ok(tokens) => {
                let session = tokens.into_session(Utc::now().timestamp());
                log!("[AUTH] Refreshed the session for {}", session.user.id);
                self.replace_session(Some(session.clone()), SessionEventKind::TokenRefreshed);
                Some(session)
            }
            Err(e) => {
                warn!("[AUTH] Session refresh failed, signing out: {e}");
                self.replace_session(None, SessionEventKind::SignedOut);
                None
            }
        }
    }
}

#[async_trait(?Send)]
impl IdentityProvider for SupabaseAuth {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        let session = self.session.borrow().clone();
        match session {
            Some(session) if session.is_expired(Utc::now().timestamp()) => {
                Ok(self.refresh(session).await)
            }
            other => Ok(other),
        }
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
        if self.current_session().await?.is_none() {
            return Ok(None);
        }
        let request = self.client.request(Method::GET, "/auth/v1/user");
        match self.client.send_json::<AuthUser>("user", request).await {
            Ok(user) => Ok(Some(user)),
            Err(BackendError::Rejected { status: 401 | 403, .. }) => {
                log!("[AUTH] Stored session expired, clearing it");
                self.replace_session(None, SessionEventKind::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let request = self
            .client
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let session = match self.client.send_json::<TokenResponse>("token", request).await {
            Ok(tokens) => tokens.into_session(Utc::now().timestamp()),
            Err(BackendError::Rejected { message, .. })
                if message.contains("Invalid login credentials") =>
            {
                return Err(BackendError::InvalidCredentials)
            }
            Err(e) => return Err(e),
        };
        self.replace_session(Some(session.clone()), SessionEventKind::SignedIn);
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> Result<AuthUser, BackendError> {
        let request = self.client.request(Method::POST, "/auth/v1/signup").json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));
        let response: SignUpResponse = self.client.send_json("signup", request).await?;

        // Without email confirmation GoTrue returns a session; otherwise the
        // body is the bare user.
        let user = match response.user {
            Some(user) => user,
            None => serde_json::from_value(response.rest).map_err(BackendError::decode)?,
        };
        if let Some(access_token) = response.access_token {
            let session = Session {
                access_token,
                refresh_token: response.refresh_token,
                expires_at: expiry(
                    response.expires_at,
                    response.expires_in,
                    Utc::now().timestamp(),
                ),
                user: user.clone(),
            };
            self.replace_session(Some(session), SessionEventKind::SignedIn);
        }
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let request = self.client.request(Method::POST, "/auth/v1/logout");
        let outcome = self.client.send("logout", request).await.map(|_| ());
        if let Err(e) = &outcome {
            error!("[AUTH] Logout request failed, dropping the local session anyway: {e}");
        }
        self.replace_session(None, SessionEventKind::SignedOut);
        outcome
    }

    async fn update_user(&self, update: UserUpdate) -> Result<AuthUser, BackendError> {
        let request = self
            .client
            .request(Method::PUT, "/auth/v1/user")
            .json(&update);
        let user: AuthUser = self.client.send_json("user", request).await?;
        let session = self.session.borrow().clone();
        if let Some(mut session) = session {
            session.user = user.clone();
            self.replace_session(Some(session), SessionEventKind::UserUpdated);
        }
        Ok(user)
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        self.listeners.subscribe(callback)
    }
}

/// Supabase Storage-backed [`ObjectStorage`].
#[derive(Clone, Debug)]
pub struct SupabaseStorage {
    client: SupabaseClient,
}

impl SupabaseStorage {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn object_path(bucket: &str, path: &str) -> String {
        format!("{}/{}", urlencoding::encode(bucket), urlencoding::encode(path))
    }
}

#[async_trait(?Send)]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), BackendError> {
        let request = self
            .client
            .request(
                Method::POST,
                &format!("/storage/v1/object/{}", Self::object_path(bucket, path)),
            )
            .header("content-type", content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes);
        self.client.send("storage", request).await.map(|_| ())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.client.url(&format!(
            "/storage/v1/object/public/{}",
            Self::object_path(bucket, path)
        ))
    }
}
