use leptos::*;
use leptos_meta::Title;
use leptos_router::{use_navigate, A};

use crate::account::register;
use crate::app::use_backend;
use crate::components::notice::use_notices;
use crate::notice::Notice;
use crate::utils::with_owner_safe;

#[component]
pub fn SignupPage() -> impl IntoView {
    let backend = use_backend();
    let notices = use_notices();
    let navigate = use_navigate();

    let (username, set_username) = create_signal(String::new());
    let (email, set_email) = create_signal(String::new());
    let (password, set_password) = create_signal(String::new());
    let (loading, set_loading) = create_signal(false);

    let incomplete = move || {
        username.with(String::is_empty) || email.with(String::is_empty) || password.with(String::is_empty)
    };

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        let backend = backend.clone();
        let navigate = navigate.clone();
        let owner = Owner::current();
        let fields = (
            username.get_untracked(),
            email.get_untracked(),
            password.get_untracked(),
        );

        set_loading.set(true);
        spawn_local(async move {
            let (username, email, password) = fields;
            let result = register(&backend, &username, &email, &password).await;
            with_owner_safe(owner, "registration", move || {
                set_loading.set(false);
                match result {
                    Ok(_) => {
                        notices.push(Notice::success(
                            "Sikeres regisztráció",
                            "Sikeresen regisztráltad a fiókodat!",
                        ));
                        navigate("/", Default::default());
                    }
                    Err(err) => notices.push(err.notice()),
                }
            });
        });
    };

    view! {
        <Title text="Xcape - Regisztráció"/>
        <form class="auth-card" on:submit=on_submit>
            <h2>"Regisztráció"</h2>
            <input
                placeholder="Felhasználónév"
                prop:value=username
                disabled=loading
                on:input=move |e| set_username.set(event_target_value(&e))
            />
            <input
                type="email"
                placeholder="Email"
                prop:value=email
                disabled=loading
                on:input=move |e| set_email.set(event_target_value(&e))
            />
            <input
                type="password"
                placeholder="Jelszó"
                prop:value=password
                disabled=loading
                on:input=move |e| set_password.set(event_target_value(&e))
            />
            <button type="submit" disabled=move || loading.get() || incomplete()>
                "Regisztrálok"
            </button>
            <p>"Már van fiókod? " <A href="/login">"Jelentkezz be!"</A></p>
        </form>
    }
}
