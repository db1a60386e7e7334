pub mod account;
pub mod api;
pub mod app;
pub mod backend;
pub mod components;
pub mod config;
pub mod db;
pub mod download;
pub mod error;
pub mod identity;
pub mod models;
pub mod notice;
pub mod pages;
pub mod reviews;
pub mod utils;

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::*;

    utils::panic_hook::init();
    leptos::mount_to_body(App);
}
