use leptos::logging::{error, log};
use leptos::*;
use leptos_meta::Title;
use leptos_router::use_navigate;
use uuid::Uuid;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{File, HtmlInputElement};

use crate::account::{
    load_profile, load_profile_picture, update_email, update_username, upload_profile_picture,
};
use crate::app::{use_backend, use_identity, use_site_config};
use crate::components::notice::use_notices;
use crate::error::AppError;
use crate::notice::Notice;
use crate::utils::with_owner_safe;

async fn read_file(file: &File) -> Result<Vec<u8>, String> {
    let buffer = JsFuture::from(file.array_buffer())
        .await
        .map_err(|e| format!("{e:?}"))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

#[component]
pub fn ProfilePage() -> impl IntoView {
    let backend = use_backend();
    let config = use_site_config();
    let identity = use_identity();
    let notices = use_notices();
    let navigate = use_navigate();

    let (user_id, set_user_id) = create_signal(None::<Uuid>);
    let (username, set_username) = create_signal(String::new());
    let (email, set_email) = create_signal(String::new());
    let (picture, set_picture) = create_signal(None::<String>);
    let (loading, set_loading) = create_signal(false);

    // Visitors without a session are sent to the login page.
    create_effect(move |_| {
        let (initialized, signed_in) =
            identity.with(|state| (state.initialized, state.is_signed_in()));
        if initialized && !signed_in {
            navigate("/login", Default::default());
        }
    });

    let profile_backend = backend.clone();
    create_effect(move |_| {
        let Some(principal) = identity.with(|state| state.principal.clone()) else {
            return;
        };
        if user_id.get_untracked() == Some(principal.id) {
            return;
        }
        let backend = profile_backend.clone();
        let owner = Owner::current();
        spawn_local(async move {
            let user = match backend.identity.current_user().await {
                Ok(Some(user)) => user,
                Ok(None) => return,
                Err(e) => {
                    error!("[AUTH] Could not load the current user: {e}");
                    return;
                }
            };
            let profile = load_profile(backend.store.as_ref(), &user).await;
            let pic = load_profile_picture(backend.store.as_ref(), user.id)
                .await
                .unwrap_or_else(|e| {
                    error!("[AUTH] Profile picture lookup failed: {e}");
                    None
                });
            with_owner_safe(owner, "profile load", move || {
                set_user_id.set(Some(profile.id));
                set_username.set(profile.username);
                set_email.set(profile.email);
                set_picture.set(pic);
            });
        });
    });

    let run = {
        let backend = backend.clone();
        move |label: &'static str, success: Notice, action: ProfileAction| {
            let Some(id) = user_id.get_untracked() else {
                return;
            };
            let backend = backend.clone();
            let bucket = config.profile_pic_bucket.clone();
            let owner = Owner::current();
            set_loading.set(true);
            spawn_local(async move {
                let result = match action {
                    ProfileAction::Email(value) => update_email(&backend, id, &value).await.map(|_| None),
                    ProfileAction::Username(value) => {
                        update_username(&backend, id, &value).await.map(|_| None)
                    }
                    ProfileAction::Picture(file) => match read_file(&file).await {
                        Ok(bytes) => upload_profile_picture(
                            &backend,
                            &bucket,
                            id,
                            &file.name(),
                            bytes,
                            &file.type_(),
                        )
                        .await
                        .map(Some),
                        Err(e) => {
                            error!("[AUTH] Could not read {}: {e}", file.name());
                            Err(AppError::NoFileSelected)
                        }
                    },
                };
                with_owner_safe(owner, label, move || {
                    set_loading.set(false);
                    match result {
                        Ok(url) => {
                            if let Some(url) = url {
                                set_picture.set(Some(url));
                            }
                            log!("[AUTH] {label} done");
                            notices.push(success);
                        }
                        Err(err) => notices.push(err.notice()),
                    }
                });
            });
        }
    };

    let run_email = run.clone();
    let run_username = run.clone();
    let on_file = move |ev: ev::Event| {
        let file = ev
            .target()
            .and_then(|target| target.dyn_into::<HtmlInputElement>().ok())
            .and_then(|input| input.files())
            .and_then(|files| files.get(0));
        match file {
            Some(file) => run(
                "picture upload",
                Notice::success("Sikeres feltöltés", "Profilkép sikeresen frissítve!"),
                ProfileAction::Picture(file),
            ),
            None => notices.push(AppError::NoFileSelected.notice()),
        }
    };

    view! {
        <Title text="Xcape - Profil"/>
        <Show
            when=move || user_id.with(Option::is_some)
            fallback=|| view! { <p class="loading">"Betöltés..."</p> }
        >
            <section class="profile">
                <h2>"Profil"</h2>
                {move || match picture.get() {
                    Some(url) => view! { <img class="avatar-large" src=url alt="profil_pic"/> }.into_view(),
                    None => view! { <div class="avatar-large avatar-empty">"Nincs kép"</div> }.into_view(),
                }}
                <label>
                    "Profilkép feltöltése"
                    <input type="file" accept="image/*" disabled=loading on:change=on_file.clone()/>
                </label>
                <label>
                    "Felhasználónév"
                    <input prop:value=username on:input=move |e| set_username.set(event_target_value(&e))/>
                </label>
                <button
                    disabled=loading
                    on:click={
                        let run = run_username.clone();
                        move |_| run(
                            "username update",
                            Notice::success("Sikeres mentés", "Felhasználónév sikeresen frissítve!"),
                            ProfileAction::Username(username.get_untracked()),
                        )
                    }
                >
                    "Felhasználónév mentése"
                </button>
                <label>
                    "Email"
                    <input type="email" prop:value=email on:input=move |e| set_email.set(event_target_value(&e))/>
                </label>
                <button
                    disabled=loading
                    on:click={
                        let run = run_email.clone();
                        move |_| run(
                            "email update",
                            Notice::success("Sikeres mentés", "Email sikeresen frissítve!"),
                            ProfileAction::Email(email.get_untracked()),
                        )
                    }
                >
                    "Email mentése"
                </button>
            </section>
        </Show>
    }
}

enum ProfileAction {
    Email(String),
    Username(String),
    Picture(File),
}
