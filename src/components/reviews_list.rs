use leptos::*;

use crate::components::star_rating::StarRating;
use crate::models::review::EnrichedReview;
use crate::reviews::ReviewFeed;

#[component]
fn ReviewCard(review: EnrichedReview) -> impl IntoView {
    let pending = !review.is_confirmed();
    let date = review.review.created_at.format("%Y.%m.%d.").to_string();
    let rating = f64::from(review.review.rating);

    view! {
        <li class="review-card" class:review-pending=pending>
            <img class="avatar" src=review.profile_pic alt="profilkép" />
            <div class="review-body">
                <div class="review-header">
                    <strong>{review.review.username}</strong>
                    <StarRating rating=rating />
                    <span class="review-date">{date}</span>
                </div>
                <p>{review.review.comment}</p>
            </div>
        </li>
    }
}

/// The review feed, five at a time.
#[component]
pub fn ReviewsList(feed: RwSignal<ReviewFeed>) -> impl IntoView {
    view! {
        <div class="reviews">
            <h3>"Értékelések"</h3>
            <Show
                when=move || feed.with(|feed| !feed.is_empty())
                fallback=|| view! { <p>"Még nincs értékelés. Legyél te az első!"</p> }
            >
                <ul>
                    {move || {
                        feed.with(|feed| {
                            feed.visible()
                                .iter()
                                .cloned()
                                .map(|review| view! { <ReviewCard review=review /> })
                                .collect_view()
                        })
                    }}
                </ul>
            </Show>
            <Show when=move || feed.with(ReviewFeed::can_show_more)>
                <button class="show-more" on:click=move |_| feed.update(ReviewFeed::show_more)>
                    "Több értékelés"
                </button>
            </Show>
        </div>
    }
}
