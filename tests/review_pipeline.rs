use serde_json::json;
use uuid::Uuid;
use xcape::backend::memory::MemoryBackend;
use xcape::backend::{IdentityProvider, Table};
use xcape::error::AppError;
use xcape::identity::IdentityContext;
use xcape::models::review::Confirmation;
use xcape::reviews::{load_reviews, submit_review, Author, ReviewFeed};

const DEFAULT_PIC: &str = "https://cdn.xcape.hu/default.png";

fn seed_profile(backend: &MemoryBackend, id: Uuid, username: &str) {
    backend.store.seed(
        Table::Profiles,
        json!({"id": id, "username": username, "email": format!("{username}@xcape.hu")}),
    );
}

#[tokio::test]
async fn legacy_rows_join_pictures_by_display_name() {
    let backend = MemoryBackend::new();
    let (id1, id2) = (Uuid::new_v4(), Uuid::new_v4());
    seed_profile(&backend, id1, "a");
    seed_profile(&backend, id2, "b");
    backend.store.seed(
        Table::ProfilePics,
        json!({"user_id": id1, "file_name": "a.png", "public_url": "url1"}),
    );
    for (id, name) in [(1, "a"), (2, "b")] {
        backend.store.seed(
            Table::Reviews,
            json!({"id": id, "username": name, "rating": 5, "comment": "ok", "created_at": "2024-05-01T10:00:00Z"}),
        );
    }

    let reviews = load_reviews(backend.store.as_ref(), DEFAULT_PIC).await.unwrap();

    let a = reviews.iter().find(|r| r.review.username == "a").unwrap();
    let b = reviews.iter().find(|r| r.review.username == "b").unwrap();
    assert_eq!(a.profile_pic, "url1");
    assert_eq!(b.profile_pic, DEFAULT_PIC);
}

#[tokio::test]
async fn unauthenticated_submission_makes_no_remote_calls() {
    let backend = MemoryBackend::new();
    let identity = IdentityContext::new(backend.identity.clone(), backend.store.clone());
    identity.init().await;
    let before = backend.remote_calls();

    let result = submit_review(
        backend.store.as_ref(),
        identity.author().as_ref(),
        "5",
        "Remek",
        DEFAULT_PIC,
    )
    .await;

    assert_eq!(result, Err(AppError::NotSignedIn));
    assert_eq!(backend.remote_calls(), before);
}

#[tokio::test]
async fn submitted_review_is_prepended_then_confirmed_by_reload() {
    let backend = MemoryBackend::new();
    let user = backend.identity.add_account("kata@xcape.hu", "titok123", "Kata");
    seed_profile(&backend, user.id, "Kata");
    backend.store.seed(
        Table::Reviews,
        json!({"id": 1, "username": "regi", "rating": 3, "comment": "Jó", "created_at": "2024-05-01T10:00:00Z"}),
    );
    backend
        .identity
        .sign_in_with_password("kata@xcape.hu", "titok123")
        .await
        .unwrap();
    let identity = IdentityContext::new(backend.identity.clone(), backend.store.clone());
    identity.init().await;

    let mut feed = ReviewFeed::new();
    feed.replace(load_reviews(backend.store.as_ref(), DEFAULT_PIC).await.unwrap());
    let before = feed.len();

    let author: Option<Author> = identity.author();
    let submitted = submit_review(backend.store.as_ref(), author.as_ref(), "4", "Izgalmas", DEFAULT_PIC)
        .await
        .unwrap();
    feed.prepend(submitted.clone());

    assert_eq!(feed.len(), before + 1);
    assert_eq!(feed.entries()[0], submitted);
    assert_eq!(feed.entries()[0].confirmation, Confirmation::Unconfirmed);

    feed.replace(load_reviews(backend.store.as_ref(), DEFAULT_PIC).await.unwrap());
    assert_eq!(feed.len(), before + 1);
    assert_eq!(feed.entries()[0].review.id, submitted.review.id);
    assert_eq!(feed.unconfirmed(), 0);
}
