use leptos::*;

use crate::reviews::stars_for;

/// Five stars for a rating; a fractional rating gets one partial star.
#[component]
pub fn StarRating(#[prop(into)] rating: MaybeSignal<f64>) -> impl IntoView {
    let stars = move || {
        let display = stars_for(rating.get());
        let full = (0..display.full).map(|_| view! { <span class="star star-full">"★"</span> });
        let half = display
            .half
            .then(|| view! { <span class="star star-half">"★"</span> });
        let empty = (0..display.empty).map(|_| view! { <span class="star star-empty">"☆"</span> });
        full.chain(half).chain(empty).collect_view()
    };

    view! { <span class="star-rating">{stars}</span> }
}
