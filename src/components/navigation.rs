use leptos::*;
use leptos_router::{use_navigate, A};

use crate::account::sign_out;
use crate::app::{use_backend, use_identity};
use crate::components::notice::use_notices;
use crate::utils::with_owner_safe;

#[component]
pub fn Navigation() -> impl IntoView {
    let identity = use_identity();
    let backend = use_backend();
    let notices = use_notices();
    let navigate = use_navigate();

    let on_sign_out = move |_| {
        let backend = backend.clone();
        let navigate = navigate.clone();
        let owner = Owner::current();
        spawn_local(async move {
            let result = sign_out(&backend).await;
            with_owner_safe(owner, "sign out", move || match result {
                Ok(()) => navigate("/", Default::default()),
                Err(err) => notices.push(err.notice()),
            });
        });
    };

    view! {
        <nav class="navbar">
            <A href="/">"Xcape"</A>
            <A href="/download">"Letöltés"</A>
            <Show
                when=move || identity.with(|state| state.is_signed_in())
                fallback=|| view! {
                    <A href="/login">"Bejelentkezés"</A>
                    <A href="/signup">"Regisztráció"</A>
                }
            >
                <A href="/profil">
                    {move || identity.with(|state| state.display_name.clone())}
                </A>
                <button class="sign-out" on:click=on_sign_out.clone()>"Kijelentkezés"</button>
            </Show>
        </nav>
    }
}
