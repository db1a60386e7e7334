#![cfg(target_arch = "wasm32")]

use leptos::*;
use leptos_router::Router;
use uuid::Uuid;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use xcape::components::review_form::ReviewGate;
use xcape::identity::IdentityState;
use xcape::models::session::Principal;

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

fn mount_gate(container: &web_sys::Element, identity: RwSignal<IdentityState>) {
    mount_to(container.clone().unchecked_into(), move || {
        provide_context(identity);
        view! {
            <Router>
                <ReviewGate>
                    <form class="gated-form"></form>
                </ReviewGate>
            </Router>
        }
    });
}

fn signed_in(display_name: &str) -> IdentityState {
    IdentityState {
        principal: Some(Principal {
            id: Uuid::new_v4(),
            email: "a@xcape.hu".into(),
        }),
        display_name: display_name.into(),
        initialized: true,
    }
}

#[wasm_bindgen_test]
fn test_signed_out_visitor_sees_the_prompt() {
    let container = mount_container("gate-signed-out");
    let identity = create_rw_signal(IdentityState {
        initialized: true,
        ..IdentityState::default()
    });
    mount_gate(&container, identity);

    assert_eq!(count(&container, ".gated-form"), 0);
    assert_eq!(count(&container, ".sign-in-prompt"), 1);
    assert_eq!(count(&container, "a[href='/login']"), 1);
}

#[wasm_bindgen_test]
fn test_user_without_display_name_sees_the_prompt() {
    let container = mount_container("gate-nameless");
    mount_gate(&container, create_rw_signal(signed_in("")));

    assert_eq!(count(&container, ".gated-form"), 0);
    assert_eq!(count(&container, ".sign-in-prompt"), 1);
}

#[wasm_bindgen_test]
fn test_form_appears_once_the_name_resolves() {
    let container = mount_container("gate-resolves");
    let identity = create_rw_signal(signed_in(""));
    mount_gate(&container, identity);

    identity.update(|state| state.display_name = "Anna".into());

    assert_eq!(count(&container, ".gated-form"), 1);
    assert_eq!(count(&container, ".sign-in-prompt"), 0);
}
