pub mod leptos_owner;
pub mod panic_hook;

pub use leptos_owner::with_owner_safe;
