use std::panic;
use leptos::logging::{error, log};

/// Installs a panic hook that explains panics caused by signal writes after a
/// page has been left.
pub fn set_custom_panic_hook() {
    let original_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        original_hook(panic_info);

        let message = if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else {
            "Unknown panic".to_string()
        };

        if message.contains("OwnerDisposed") || message.contains("disposed") {
            error!("[PANIC] A page was left while a backend request was still running.");
            error!("[PANIC] Write signals from async tasks through with_owner_safe.");
        }
    }));
}

/// Call once from the hydration entry point.
pub fn init() {
    console_error_panic_hook::set_once();
    set_custom_panic_hook();
    log!("[PANIC_HOOK] Custom panic hook set up successfully");
}
