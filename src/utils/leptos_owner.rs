use leptos::logging::log;
use leptos::Owner;

/// Runs `f` under `owner` if it is still alive.
///
/// Async tasks capture the owner of the view that spawned them; when the view
/// has been unmounted in the meantime the write is skipped and logged.
pub fn with_owner_safe<F, R>(owner: Option<Owner>, log_context: &str, f: F) -> Option<R>
where
    F: FnOnce() -> R,
{
    let Some(owner) = owner else {
        log!("[OWNER] No Leptos owner captured: {}", log_context);
        return None;
    };
    match leptos::try_with_owner(owner, f) {
        Ok(result) => Some(result),
        Err(_) => {
            log!("[OWNER] View gone, skipping update: {}", log_context);
            None
        }
    }
}
