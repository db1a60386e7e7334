use leptos::*;
use leptos_meta::Title;
use leptos_router::A;

use crate::app::{use_identity, use_site_config};
use crate::download::DownloadAccess;

#[component]
pub fn DownloadPage() -> impl IntoView {
    let identity = use_identity();
    let game_url = use_site_config().game_download_url;

    let access = move || identity.with(|state| DownloadAccess::for_state(state, &game_url));

    view! {
        <Title text="Xcape - Letöltés"/>
        <section class="download">
            <h1>"Xcape Letöltés"</h1>
            <p>
                "Üdvözlünk az Xcape letöltési oldalon! Töltsd le a játékot, csomagold ki, és indulhat a kaland!"
            </p>
            {move || match access() {
                DownloadAccess::Pending => view! { <p>"Betöltés..."</p> }.into_view(),
                DownloadAccess::Granted { url } => view! {
                    <a class="download-button" href=url download="">"Letöltés"</a>
                }
                .into_view(),
                DownloadAccess::SignInRequired => view! {
                    <p>
                        "A letöltéshez be kell jelentkezned. "
                        <A href="/login">"Bejelentkezés"</A>
                    </p>
                }
                .into_view(),
            }}
        </section>
    }
}
