use gloo_timers::future::TimeoutFuture;
use leptos::logging::warn;
use leptos::*;

use crate::notice::{Notice, NOTICE_DURATION_MS};
use crate::utils::with_owner_safe;

/// Transient notices shown in the corner of every page.
#[derive(Clone, Copy)]
pub struct Notices {
    entries: RwSignal<Vec<(u64, Notice)>>,
    next_id: StoredValue<u64>,
}

impl Notices {
    pub fn new() -> Self {
        Notices {
            entries: create_rw_signal(Vec::new()),
            next_id: store_value(0),
        }
    }

    /// Shows `notice` and removes it again after a few seconds.
    pub fn push(&self, notice: Notice) {
        let id = self.next_id.get_value();
        self.next_id.set_value(id + 1);
        self.entries.update(|entries| entries.push((id, notice)));

        let this = *self;
        let owner = Owner::current();
        spawn_local(async move {
            TimeoutFuture::new(NOTICE_DURATION_MS).await;
            with_owner_safe(owner, "notice timeout", || this.dismiss(id));
        });
    }

    pub fn dismiss(&self, id: u64) {
        self.entries
            .update(|entries| entries.retain(|(entry_id, _)| *entry_id != id));
    }
}

impl Default for Notices {
    fn default() -> Self {
        Self::new()
    }
}

pub fn use_notices() -> Notices {
    use_context::<Notices>().unwrap_or_else(|| {
        warn!("[NOTICE] No notice stack in context, creating a detached one");
        Notices::new()
    })
}

#[component]
pub fn NoticeStack() -> impl IntoView {
    let notices = use_notices();

    view! {
        <div class="notice-stack">
            <For
                each=move || notices.entries.get()
                key=|(id, _)| *id
                children=move |(id, notice)| {
                    let class = notice.level.css_class();
                    view! {
                        <div class=class on:click=move |_| notices.dismiss(id)>
                            <strong>{notice.title}</strong>
                            <p>{notice.description}</p>
                        </div>
                    }
                }
            />
        </div>
    }
}
