//! Application shell: routes, shared backend, identity and notices.
use futures::StreamExt;
use leptos::logging::warn;
use leptos::*;
use leptos_meta::*;
use leptos_router::*;

use crate::backend::Backend;
use crate::components::navigation::Navigation;
use crate::components::notice::{NoticeStack, Notices};
use crate::config::SiteConfig;
use crate::identity::{IdentityContext, IdentityState};
use crate::pages::{
    auth::AuthRedirect, download::DownloadPage, landing::Landing, login::LoginPage,
    profile::ProfilePage, signup::SignupPage,
};
use crate::utils::with_owner_safe;

#[component]
pub fn App() -> impl IntoView {
    provide_meta_context();

    let config = SiteConfig::embedded();
    let backend = Backend::supabase(&config);
    let identity = IdentityContext::new(backend.identity.clone(), backend.store.clone());
    let identity_state = create_rw_signal(IdentityState::default());

    provide_context(config);
    provide_context(backend);
    provide_context(identity_state);
    provide_context(Notices::new());

    // Effects only run in the browser, so the session is never touched
    // during server rendering.
    create_effect(move |started: Option<()>| {
        if started.is_none() {
            track_identity(identity.clone(), identity_state);
        }
    });

    view! {
        <Stylesheet id="leptos" href="/pkg/xcape.css"/>
        <Title text="Xcape"/>
        <Router>
            <Navigation/>
            <NoticeStack/>
            <main>
                <Routes>
                    <Route path="/" view=Landing/>
                    <Route path="/login" view=LoginPage/>
                    <Route path="/signup" view=SignupPage/>
                    <Route path="/profil" view=ProfilePage/>
                    <Route path="/download" view=DownloadPage/>
                    <Route path="/auth" view=AuthRedirect/>
                </Routes>
            </main>
        </Router>
    }
}

/// Loads the initial session, then follows session changes until the shell
/// is disposed, which drops the subscription.
fn track_identity(identity: IdentityContext, state: RwSignal<IdentityState>) {
    let owner = Owner::current();
    let (subscription, mut events) = identity.subscribe();
    on_cleanup(move || drop(subscription));

    spawn_local(async move {
        let initial = identity.init().await;
        with_owner_safe(owner, "identity init", || state.set(initial));

        while let Some(event) = events.next().await {
            let next = identity.apply(&event).await;
            if with_owner_safe(owner, "identity update", || state.set(next)).is_none() {
                break;
            }
        }
    });
}

pub fn use_backend() -> Backend {
    use_context::<Backend>().unwrap_or_else(|| {
        warn!("[APP] No backend in context, using the embedded configuration");
        Backend::supabase(&SiteConfig::embedded())
    })
}

pub fn use_site_config() -> SiteConfig {
    use_context::<SiteConfig>().unwrap_or_else(SiteConfig::embedded)
}

/// The current identity, as a signal views can track.
pub fn use_identity() -> RwSignal<IdentityState> {
    use_context::<RwSignal<IdentityState>>().unwrap_or_else(|| {
        warn!("[APP] No identity in context, treating the visitor as signed out");
        create_rw_signal(IdentityState {
            initialized: true,
            ..IdentityState::default()
        })
    })
}
