use leptos::*;
use leptos_meta::Title;
use leptos_router::{use_navigate, A};

use crate::account::sign_in_with_username;
use crate::app::use_backend;
use crate::components::notice::use_notices;
use crate::notice::Notice;
use crate::utils::with_owner_safe;

#[component]
pub fn LoginPage() -> impl IntoView {
    let backend = use_backend();
    let notices = use_notices();
    let navigate = use_navigate();

    let (username, set_username) = create_signal(String::new());
    let (password, set_password) = create_signal(String::new());
    let (loading, set_loading) = create_signal(false);

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        let backend = backend.clone();
        let navigate = navigate.clone();
        let owner = Owner::current();
        let (username, password) = (username.get_untracked(), password.get_untracked());

        set_loading.set(true);
        spawn_local(async move {
            let result = sign_in_with_username(&backend, &username, &password).await;
            with_owner_safe(owner, "sign in", move || {
                set_loading.set(false);
                match result {
                    Ok(_) => {
                        notices.push(Notice::success(
                            "Sikeres bejelentkezés",
                            "Sikeresen bejelentkeztél!",
                        ));
                        navigate("/auth", Default::default());
                    }
                    Err(err) => notices.push(err.notice()),
                }
            });
        });
    };

    view! {
        <Title text="Xcape - Bejelentkezés"/>
        <form class="auth-card" on:submit=on_submit>
            <h2>"Bejelentkezés"</h2>
            <input
                placeholder="Felhasználónév"
                prop:value=username
                disabled=loading
                on:input=move |e| set_username.set(event_target_value(&e))
            />
            <input
                type="password"
                placeholder="Jelszó"
                prop:value=password
                disabled=loading
                on:input=move |e| set_password.set(event_target_value(&e))
            />
            <button type="submit" disabled=loading>
                {move || if loading.get() { "Bejelentkezés..." } else { "Bejelentkezés" }}
            </button>
            <p>"Nincs még fiókod? " <A href="/signup">"Regisztráció"</A></p>
        </form>
    }
}
