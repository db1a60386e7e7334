#![cfg(target_arch = "wasm32")]

use leptos::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use xcape::components::star_rating::StarRating;

wasm_bindgen_test_configure!(run_in_browser);

fn mount_container(id: &str) -> web_sys::Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let container = document.create_element("div").unwrap();
    container.set_id(id);
    document.body().unwrap().append_child(&container).unwrap();
    container
}

fn count(container: &web_sys::Element, selector: &str) -> u32 {
    container.query_selector_all(selector).unwrap().length()
}

#[wasm_bindgen_test]
fn test_whole_rating_renders_full_and_empty_stars() {
    let container = mount_container("stars-whole");
    mount_to(container.clone().unchecked_into(), || view! { <StarRating rating=3.0 /> });

    assert_eq!(count(&container, ".star-full"), 3);
    assert_eq!(count(&container, ".star-half"), 0);
    assert_eq!(count(&container, ".star-empty"), 2);
}

#[wasm_bindgen_test]
fn test_fractional_rating_adds_a_partial_star() {
    let container = mount_container("stars-fraction");
    mount_to(container.clone().unchecked_into(), || view! { <StarRating rating=4.2 /> });

    assert_eq!(count(&container, ".star-full"), 4);
    assert_eq!(count(&container, ".star-half"), 1);
    assert_eq!(count(&container, ".star"), 5);
}

#[wasm_bindgen_test]
fn test_rating_signal_rerenders() {
    let container = mount_container("stars-signal");
    let rating = create_rw_signal(1.0);
    mount_to(container.clone().unchecked_into(), move || view! { <StarRating rating=rating /> });
    assert_eq!(count(&container, ".star-full"), 1);

    rating.set(3.5);

    assert_eq!(count(&container, ".star-full"), 3);
    assert_eq!(count(&container, ".star-half"), 1);
    assert_eq!(count(&container, ".star"), 5);
}
