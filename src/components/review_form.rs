use leptos::logging::log;
use leptos::*;
use leptos_router::A;

use crate::app::{use_backend, use_identity, use_site_config};
use crate::components::notice::use_notices;
use crate::models::review::EnrichedReview;
use crate::notice::Notice;
use crate::reviews::submit_review;
use crate::utils::with_owner_safe;

/// Rating and comment form. Submits as the signed-in user and hands the
/// stored review back so the list can show it without a reload. Callers
/// only mount it once the user has a display name.
#[component]
pub fn ReviewForm(
    on_submitted: Callback<EnrichedReview>,
    /// Called when the review was stored but could not be displayed.
    on_reload: Callback<()>,
) -> impl IntoView {
    let backend = use_backend();
    let config = use_site_config();
    let identity = use_identity();
    let notices = use_notices();

    let (rating, set_rating) = create_signal(String::new());
    let (comment, set_comment) = create_signal(String::new());
    let (pending, set_pending) = create_signal(false);

    let submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        if pending.get_untracked() {
            return;
        }
        let author = identity.get_untracked().author();
        let store = backend.store.clone();
        let default_pic = config.default_profile_pic.clone();
        let (rating_input, comment_input) = (rating.get_untracked(), comment.get_untracked());
        let owner = Owner::current();

        set_pending.set(true);
        spawn_local(async move {
            let result = submit_review(
                store.as_ref(),
                author.as_ref(),
                &rating_input,
                &comment_input,
                &default_pic,
            )
            .await;

            with_owner_safe(owner, "review submission", move || {
                set_pending.set(false);
                match result {
                    Ok(review) => {
                        log!("[REVIEWS] Showing review {}", review.review.id);
                        set_rating.set(String::new());
                        set_comment.set(String::new());
                        notices.push(Notice::success(
                            "Sikeres beküldés!",
                            "Köszönjük az értékelésed!",
                        ));
                        on_submitted.call(review);
                    }
                    Err(err) => {
                        notices.push(err.notice());
                        if err.persisted() {
                            on_reload.call(());
                        }
                    }
                }
            });
        });
    };

    view! {
        <form class="review-form" on:submit=submit>
            <h3>"Írj értékelést"</h3>
            <label>
                "Felhasználónév"
                <input type="text" disabled=true prop:value=move || identity.with(|state| state.display_name.clone())/>
            </label>
            <input
                type="number"
                min="1"
                max="5"
                placeholder="Értékelés (1-5)"
                prop:value=rating
                on:input=move |e| set_rating.set(event_target_value(&e))
            />
            <textarea
                placeholder="Írd le a véleményed..."
                prop:value=comment
                on:input=move |e| set_comment.set(event_target_value(&e))
            />
            <button type="submit" disabled=pending>
                {move || if pending.get() { "Beküldés..." } else { "Beküldés" }}
            </button>
        </form>
    }
}

/// Shows its children only to a signed-in user with a display name, and a
/// sign-in prompt to everyone else.
#[component]
pub fn ReviewGate(children: ChildrenFn) -> impl IntoView {
    let identity = use_identity();
    view! {
        <Show
            when=move || identity.with(|state| state.author().is_some())
            fallback=|| view! {
                <p class="sign-in-prompt">
                    "Kérlek, "
                    <A href="/login">"jelentkezz be"</A>
                    " és állíts be egy felhasználónevet az értékelés írásához!"
                </p>
            }
        >
            {children()}
        </Show>
    }
}
