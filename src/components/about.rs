//! The game introduction on the landing page: a rotating text and picture,
//! revealed when it scrolls into view.

use gloo_timers::callback::Interval;
use gloo_timers::future::TimeoutFuture;
use leptos::logging::warn;
use leptos::*;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit};

use crate::utils::with_owner_safe;

pub const SLIDE_INTERVAL_MS: u32 = 6000;
pub const SCROLL_DURATION_MS: f64 = 1000.0;
const SCROLL_FRAME_MS: u32 = 16;
/// Share of the section that must be on screen before it is revealed.
const REVEAL_THRESHOLD: f64 = 0.1;

pub struct Slide {
    pub text: &'static str,
    pub image: &'static str,
}

pub const SLIDES: [Slide; 3] = [
    Slide {
        text: "Játékunk egy pakisztáni börtönben játszódik. A célunk hogy kijussunk innen.",
        image: "/assets/images/map.png",
    },
    Slide {
        text: "A kijutás viszont nem olyan könnyű. Ezt őrök nehezítik meg, akik ha észrevesznek, akkor elkapnak.",
        image: "/assets/images/or.png",
    },
    Slide {
        text: "Elrejtett tárgyakkal, mint például kulcsok, feszítővas segítségével kell kijutnunk.",
        image: "/assets/images/itemek.png",
    },
];

pub fn next_slide(current: usize) -> usize {
    (current + 1) % SLIDES.len()
}

/// Quadratic ease-in-out: position at `elapsed` when moving from `start` by
/// `distance` over `duration`.
pub fn ease_in_out_quad(elapsed: f64, start: f64, distance: f64, duration: f64) -> f64 {
    let t = (elapsed / (duration / 2.0)).clamp(0.0, 2.0);
    if t < 1.0 {
        distance / 2.0 * t * t + start
    } else {
        let t = t - 1.0;
        -distance / 2.0 * (t * (t - 2.0) - 1.0) + start
    }
}

/// Scroll offset that centres a section of `height` whose top is `top`
/// pixels below the current viewport top.
pub fn centred_offset(scroll_y: f64, top: f64, height: f64, viewport: f64) -> f64 {
    scroll_y + top - viewport / 2.0 + height / 2.0
}

fn scroll_to(section: &web_sys::HtmlElement) {
    let window = window();
    let start = window.scroll_y().unwrap_or(0.0);
    let viewport = window
        .inner_height()
        .ok()
        .and_then(|height| height.as_f64())
        .unwrap_or(0.0);
    let top = section.get_bounding_client_rect().top();
    let target = centred_offset(start, top, f64::from(section.offset_height()), viewport);
    let distance = target - start;

    let owner = Owner::current();
    spawn_local(async move {
        let started = js_sys::Date::now();
        loop {
            let elapsed = js_sys::Date::now() - started;
            let y = ease_in_out_quad(elapsed, start, distance, SCROLL_DURATION_MS);
            let alive = with_owner_safe(owner, "about scroll", || {
                window.scroll_to_with_x_and_y(0.0, y)
            });
            if alive.is_none() || elapsed >= SCROLL_DURATION_MS {
                break;
            }
            TimeoutFuture::new(SCROLL_FRAME_MS).await;
        }
    });
}

fn observe_visibility(
    section: &web_sys::Element,
    set_visible: WriteSignal<bool>,
) -> Result<(), JsValue> {
    let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |entries: js_sys::Array| {
        let intersecting = entries
            .get(0)
            .dyn_into::<IntersectionObserverEntry>()
            .map(|entry| entry.is_intersecting())
            .unwrap_or(false);
        set_visible.set(intersecting);
    });
    let options = IntersectionObserverInit::new();
    options.set_threshold(&JsValue::from_f64(REVEAL_THRESHOLD));
    let observer =
        IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options)?;
    observer.observe(section);
    on_cleanup(move || {
        observer.disconnect();
        drop(callback);
    });
    Ok(())
}

/// The "Tovább" button and the about section it scrolls to.
#[component]
pub fn AboutSection() -> impl IntoView {
    let about_ref = create_node_ref::<html::Section>();
    let (current, set_current) = create_signal(0usize);
    let (visible, set_visible) = create_signal(false);

    create_effect(move |started: Option<()>| {
        if started.is_some() {
            return;
        }
        let interval = Interval::new(SLIDE_INTERVAL_MS, move || {
            set_current.update(|index| *index = next_slide(*index));
        });
        on_cleanup(move || drop(interval));
    });

    create_effect(move |observed: Option<bool>| {
        if observed == Some(true) {
            return true;
        }
        let Some(section) = about_ref.get() else {
            return false;
        };
        if let Err(e) = observe_visibility(&section, set_visible) {
            warn!("[APP] Could not observe the about section, showing it: {e:?}");
            set_visible.set(true);
        }
        true
    });

    let on_more = move |_| {
        if let Some(section) = about_ref.get_untracked() {
            scroll_to(&section);
        }
    };

    let class = move || if visible.get() { "about about-visible" } else { "about" };

    view! {
        <div class="more">
            <button class="more-button" on:click=on_more>"Tovább"</button>
        </div>
        <section class=class node_ref=about_ref>
            <h2>"A játékunkról"</h2>
            <div class="about-slide">
                <img src=move || SLIDES[current.get()].image alt="game_pics"/>
                <p>{move || SLIDES[current.get()].text}</p>
            </div>
        </section>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slides_wrap_around() {
        assert_eq!(next_slide(0), 1);
        assert_eq!(next_slide(1), 2);
        assert_eq!(next_slide(2), 0);
    }

    #[test]
    fn easing_starts_slow_and_lands_on_target() {
        assert_eq!(ease_in_out_quad(0.0, 100.0, 400.0, 1000.0), 100.0);
        assert_eq!(ease_in_out_quad(500.0, 100.0, 400.0, 1000.0), 300.0);
        assert_eq!(ease_in_out_quad(1000.0, 100.0, 400.0, 1000.0), 500.0);
        assert_eq!(ease_in_out_quad(1500.0, 100.0, 400.0, 1000.0), 500.0);
        assert!(ease_in_out_quad(100.0, 0.0, 400.0, 1000.0) < 40.0);
    }

    #[test]
    fn scroll_target_centres_the_section() {
        assert_eq!(centred_offset(200.0, 600.0, 300.0, 800.0), 550.0);
    }
}
