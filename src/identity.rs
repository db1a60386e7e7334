//! Who is signed in, and under which display name.
//!
//! [`IdentityContext`] is created once by the app shell and shared through
//! Leptos context. It owns no signals itself; the shell copies each
//! [`IdentityState`] it returns into a signal for the views.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::mpsc::{self, UnboundedReceiver};
use leptos::logging::{log, warn};
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::{
    fetch_optional, BackendError, Filter, IdentityProvider, RelationalStore, Select, Subscription,
    Table,
};
use crate::models::session::{AuthUser, Principal, SessionEvent, SessionEventKind};
use crate::reviews::Author;

/// Session events forwarded from the provider's callback.
pub type SessionEvents = UnboundedReceiver<SessionEvent>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityState {
    pub principal: Option<Principal>,
    /// Empty when unknown or while being resolved.
    pub display_name: String,
    /// Set once the initial session query has finished.
    pub initialized: bool,
}

impl IdentityState {
    pub fn is_signed_in(&self) -> bool {
        self.principal.is_some()
    }

    /// The signed-in user as a review author, once the display name is known.
    pub fn author(&self) -> Option<Author> {
        let principal = self.principal.as_ref()?;
        if self.display_name.is_empty() {
            return None;
        }
        Some(Author {
            id: principal.id,
            username: self.display_name.clone(),
        })
    }
}

#[derive(Deserialize)]
struct UsernameRow {
    username: String,
}

#[derive(Clone)]
pub struct IdentityContext {
    identity: Rc<dyn IdentityProvider>,
    store: Rc<dyn RelationalStore>,
    state: Rc<RefCell<IdentityState>>,
    generation: Rc<Cell<u64>>,
}

impl IdentityContext {
    pub fn new(identity: Rc<dyn IdentityProvider>, store: Rc<dyn RelationalStore>) -> Self {
        IdentityContext {
            identity,
            store,
            state: Rc::default(),
            generation: Rc::default(),
        }
    }

    pub fn snapshot(&self) -> IdentityState {
        self.state.borrow().clone()
    }

    pub fn author(&self) -> Option<Author> {
        self.state.borrow().author()
    }

    /// Picks up a session that already exists, e.g. restored from storage.
    pub async fn init(&self) -> IdentityState {
        let user = match self.identity.current_session().await {
            Ok(session) => session.map(|session| session.user),
            Err(e) => {
                warn!("[IDENTITY] Could not query the current session: {e}");
                None
            }
        };
        let state = self.replace_user(user.as_ref()).await;
        self.state.borrow_mut().initialized = true;
        log!("[IDENTITY] Initialised, signed in: {}", state.is_signed_in());
        self.snapshot()
    }

    /// Applies one session change. When events overlap, the last one to
    /// start wins; a name lookup that finishes late is discarded.
    pub async fn apply(&self, event: &SessionEvent) -> IdentityState {
        if event.kind == SessionEventKind::TokenRefreshed {
            let refreshed = event.session.as_ref().map(|session| session.user.id);
            let current = self.snapshot();
            if refreshed.is_some() && refreshed == current.principal.as_ref().map(|p| p.id) {
                return current;
            }
        }
        let user = match event.kind {
            SessionEventKind::SignedOut => None,
            SessionEventKind::SignedIn
            | SessionEventKind::UserUpdated
            | SessionEventKind::TokenRefreshed => {
                event.session.as_ref().map(|session| &session.user)
            }
        };
        log!("[IDENTITY] Session event {:?}", event.kind);
        self.replace_user(user).await
    }

    /// Registers with the provider and forwards events into a channel. The
    /// returned guard must live as long as the events are wanted.
    pub fn subscribe(&self) -> (Subscription, SessionEvents) {
        let (sender, receiver) = mpsc::unbounded();
        let subscription = self.identity.on_session_change(Rc::new(move |event: &SessionEvent| {
            if sender.unbounded_send(event.clone()).is_err() {
                log!("[IDENTITY] Session event dropped, receiver gone");
            }
        }));
        (subscription, receiver)
    }

    async fn replace_user(&self, user: Option<&AuthUser>) -> IdentityState {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        {
            let mut state = self.state.borrow_mut();
            state.principal = user.map(Principal::from);
            state.display_name.clear();
        }

        let Some(user) = user else {
            return self.snapshot();
        };
        let name = match display_name(self.store.as_ref(), user.id).await {
            Ok(Some(name)) => name,
            Ok(None) => {
                warn!("[IDENTITY] No profile row for {}, display name left empty", user.id);
                String::new()
            }
            Err(e) => {
                warn!("[IDENTITY] Display name lookup failed for {}: {e}", user.id);
                String::new()
            }
        };

        if self.generation.get() == generation {
            self.state.borrow_mut().display_name = name;
        } else {
            log!("[IDENTITY] Discarding stale display name for {}", user.id);
        }
        self.snapshot()
    }
}

async fn display_name(store: &dyn RelationalStore, id: Uuid) -> Result<Option<String>, BackendError> {
    let query = Select::on(Table::Profiles)
        .columns(&["username"])
        .filter(Filter::eq("id", id.to_string()));
    let row: Option<UsernameRow> = fetch_optional(store, &query).await?;
    Ok(row.map(|row| row.username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Operation};
    use futures::StreamExt;
    use serde_json::json;

    fn context(backend: &MemoryBackend) -> IdentityContext {
        IdentityContext::new(backend.identity.clone(), backend.store.clone())
    }

    #[tokio::test]
    async fn init_without_a_session_is_signed_out() {
        let backend = MemoryBackend::new();
        let state = context(&backend).init().await;

        assert!(state.initialized);
        assert!(!state.is_signed_in());
    }

    #[tokio::test]
    async fn resolves_the_display_name_from_profiles() {
        let backend = MemoryBackend::new();
        let user = backend.identity.add_account("a@xcape.hu", "secret", "metadata-name");
        backend
            .store
            .seed(Table::Profiles, json!({"id": user.id, "username": "Anna", "email": "a@xcape.hu"}));
        backend.identity.sign_in_with_password("a@xcape.hu", "secret").await.unwrap();

        let ctx = context(&backend);
        let state = ctx.init().await;

        assert_eq!(state.display_name, "Anna");
        assert_eq!(ctx.author().map(|a| a.id), Some(user.id));
    }

    #[tokio::test]
    async fn failed_lookup_leaves_the_name_empty() {
        let backend = MemoryBackend::new();
        backend.identity.add_account("a@xcape.hu", "secret", "anna");
        backend.identity.sign_in_with_password("a@xcape.hu", "secret").await.unwrap();
        backend.store.fail_on(Table::Profiles, Operation::Select);

        let ctx = context(&backend);
        let state = ctx.init().await;

        assert!(state.is_signed_in());
        assert!(state.display_name.is_empty());
        assert_eq!(ctx.author(), None);
    }

    #[tokio::test]
    async fn a_missing_profile_row_blocks_submission() {
        let backend = MemoryBackend::new();
        backend.identity.add_account("a@xcape.hu", "secret", "MetaName");
        backend.identity.sign_in_with_password("a@xcape.hu", "secret").await.unwrap();

        let ctx = context(&backend);
        let state = ctx.init().await;

        assert!(state.is_signed_in());
        assert!(state.display_name.is_empty());
        let calls_before = backend.store.calls();
        let result =
            crate::reviews::submit_review(backend.store.as_ref(), ctx.author().as_ref(), "5", "hi", "d")
                .await;
        assert_eq!(result, Err(crate::error::AppError::NotSignedIn));
        assert_eq!(backend.store.calls(), calls_before);
        assert!(backend.store.rows(Table::Reviews).is_empty());
    }

    #[tokio::test]
    async fn token_refresh_keeps_the_resolved_name() {
        let backend = MemoryBackend::new();
        let user = backend.identity.add_account("a@xcape.hu", "secret", "anna");
        backend
            .store
            .seed(Table::Profiles, json!({"id": user.id, "username": "Anna", "email": "a@xcape.hu"}));
        let session = backend.identity.sign_in_with_password("a@xcape.hu", "secret").await.unwrap();
        let ctx = context(&backend);
        ctx.init().await;
        let calls_before = backend.store.calls();

        let state = ctx
            .apply(&SessionEvent {
                kind: SessionEventKind::TokenRefreshed,
                session: Some(session),
            })
            .await;

        assert_eq!(state.display_name, "Anna");
        assert_eq!(backend.store.calls(), calls_before);
    }

    #[tokio::test]
    async fn sign_out_event_clears_everything() {
        let backend = MemoryBackend::new();
        let ctx = context(&backend);
        let (_subscription, mut events) = ctx.subscribe();
        let user = backend.identity.add_account("a@xcape.hu", "secret", "anna");
        backend
            .store
            .seed(Table::Profiles, json!({"id": user.id, "username": "anna", "email": "a@xcape.hu"}));

        backend.identity.sign_in_with_password("a@xcape.hu", "secret").await.unwrap();
        let signed_in = ctx.apply(&events.next().await.unwrap()).await;
        assert_eq!(signed_in.display_name, "anna");

        backend.identity.sign_out().await.unwrap();
        let signed_out = ctx.apply(&events.next().await.unwrap()).await;
        assert_eq!(signed_out.principal, None);
        assert!(signed_out.display_name.is_empty());
    }

    #[tokio::test]
    async fn dropping_the_guard_stops_delivery() {
        let backend = MemoryBackend::new();
        let ctx = context(&backend);

        let (subscription, _events) = ctx.subscribe();
        assert_eq!(backend.identity.listener_count(), 1);

        drop(subscription);
        assert_eq!(backend.identity.listener_count(), 0);
    }
}
