use leptos::logging::error;
use leptos::*;
use leptos_meta::Title;

use crate::app::{use_backend, use_site_config};
use crate::components::about::AboutSection;
use crate::components::notice::use_notices;
use crate::components::review_form::{ReviewForm, ReviewGate};
use crate::components::reviews_list::ReviewsList;
use crate::components::star_rating::StarRating;
use crate::models::review::EnrichedReview;
use crate::reviews::{load_reviews, load_summary, ReviewFeed, SiteSummary};
use crate::utils::with_owner_safe;

#[derive(Clone, PartialEq)]
enum SummaryState {
    Loading,
    Ready(SiteSummary),
    Failed,
}

#[component]
fn SummaryPanel(summary: ReadSignal<SummaryState>) -> impl IntoView {
    move || match summary.get() {
        SummaryState::Loading => view! { <p>"Betöltés..."</p> }.into_view(),
        SummaryState::Failed => view! { <p>"Nem sikerült lekérni az adatokat."</p> }.into_view(),
        SummaryState::Ready(summary) => {
            let stars = summary
                .average
                .value()
                .map(|value| view! { <StarRating rating=value /> });
            view! {
                <section class="summary">
                    <div><strong>{summary.players}</strong>" regisztrált játékos"</div>
                    <div><strong>{summary.ratings}</strong>" értékelés"</div>
                    <div class="average">{summary.average.to_string()} {stars}</div>
                </section>
            }
            .into_view()
        }
    }
}

#[component]
pub fn Landing() -> impl IntoView {
    let backend = use_backend();
    let config = use_site_config();
    let notices = use_notices();

    let feed = create_rw_signal(ReviewFeed::new());
    let (summary, set_summary) = create_signal(SummaryState::Loading);

    let store = backend.store.clone();
    let reload = Callback::new(move |_: ()| {
        let store = store.clone();
        let default_pic = config.default_profile_pic.clone();
        let owner = Owner::current();
        spawn_local(async move {
            let result = load_reviews(store.as_ref(), &default_pic).await;
            with_owner_safe(owner, "review load", move || match result {
                Ok(reviews) => feed.update(|feed| feed.replace(reviews)),
                Err(err) => notices.push(err.notice()),
            });
        });
    });

    let store = backend.store.clone();
    create_effect(move |loaded: Option<()>| {
        if loaded.is_some() {
            return;
        }
        reload.call(());

        let store = store.clone();
        let owner = Owner::current();
        spawn_local(async move {
            let next = match load_summary(store.as_ref()).await {
                Ok(summary) => SummaryState::Ready(summary),
                Err(err) => {
                    error!("[REVIEWS] Summary failed: {err}");
                    SummaryState::Failed
                }
            };
            with_owner_safe(owner, "summary load", || set_summary.set(next));
        });
    });

    let on_submitted = Callback::new(move |review: EnrichedReview| {
        feed.update(|feed| feed.prepend(review));
    });

    view! {
        <Title text="Xcape"/>
        <section class="hero">
            <h1>"Xcape"</h1>
            <p>"A jövő játékfejlesztői"</p>
        </section>
        <AboutSection/>
        <SummaryPanel summary=summary/>
        <ReviewGate>
            <ReviewForm on_submitted=on_submitted on_reload=reload/>
        </ReviewGate>
        <ReviewsList feed=feed/>
    }
}
