use leptos::*;
use leptos_router::use_navigate;

/// Landing spot after sign-in; forwards to the home page once the session
/// state has been picked up.
#[component]
pub fn AuthRedirect() -> impl IntoView {
    let identity = crate::app::use_identity();
    let navigate = use_navigate();

    create_effect(move |_| {
        if identity.with(|state| state.initialized) {
            navigate("/", Default::default());
        }
    });

    view! {
        <div class="auth-redirect">
            <div class="spinner"></div>
            <p>"Folyamatban van a bejelentkezés ellenőrzése..."</p>
        </div>
    }
}
