//! Submitting a review and building its display entry without a re-fetch.

use leptos::logging::{error, log};
use uuid::Uuid;

use super::load::{enrich, fetch_author_pictures, AuthorProfiles};
use crate::backend::{
    fetch_optional, from_row, to_row, BackendError, Filter, RelationalStore, Select, Table,
};
use crate::error::AppError;
use crate::models::profile::ProfileRef;
use crate::models::review::{Confirmation, EnrichedReview, NewReview, Review};

/// The signed-in user a review is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: Uuid,
    pub username: String,
}

/// A review that passed client-side validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidReview {
    pub rating: i32,
    pub comment: String,
}

/// Checks the raw form input: a whole rating in 1..=5 and a non-blank comment.
pub fn validate(rating: &str, comment: &str) -> Result<ValidReview, AppError> {
    let rating = rating
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| AppError::InvalidRating(rating.trim().to_string()))?;
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(AppError::EmptyComment);
    }
    Ok(ValidReview {
        rating,
        comment: comment.to_string(),
    })
}

async fn resolve_author(
    store: &dyn RelationalStore,
    author_id: Uuid,
) -> Result<AuthorProfiles, BackendError> {
    let query = Select::on(Table::Profiles)
        .columns(&["id", "username"])
        .filter(Filter::eq("id", author_id.to_string()));
    let profile: ProfileRef = fetch_optional(store, &query)
        .await?
        .ok_or_else(|| BackendError::not_found("profile"))?;
    Ok(AuthorProfiles::new(vec![profile]))
}

/// Inserts the review and returns it enriched and marked unconfirmed.
///
/// Nothing is sent unless `author` is present and the input validates. If
/// the insert succeeds but the author lookup afterwards fails, the error is
/// [`AppError::ReviewNotDisplayed`] so the caller can schedule a reload.
pub async fn submit_review(
    store: &dyn RelationalStore,
    author: Option<&Author>,
    rating: &str,
    comment: &str,
    default_pic: &str,
) -> Result<EnrichedReview, AppError> {
    let author = author
        .filter(|author| !author.username.is_empty())
        .ok_or(AppError::NotSignedIn)?;
    let valid = validate(rating, comment)?;

    let new_review = NewReview {
        user_id: author.id,
        username: author.username.clone(),
        rating: valid.rating,
        comment: valid.comment,
    };
    let row = to_row(&new_review).map_err(AppError::remote("submitting review"))?;
    let inserted = store
        .insert(Table::Reviews, row)
        .await
        .and_then(from_row::<Review>)
        .map_err(|e| {
            error!("[REVIEWS] Failed to insert review: {e}");
            AppError::remote("submitting review")(e)
        })?;
    log!("[REVIEWS] Stored review {} by {}", inserted.id, author.username);

    let profiles = resolve_author(store, author.id).await.map_err(|e| {
        error!("[REVIEWS] Review {} stored but author lookup failed: {e}", inserted.id);
        AppError::ReviewNotDisplayed(e)
    })?;
    let pictures = fetch_author_pictures(store, &profiles.ids())
        .await
        .map_err(|e| {
            error!("[REVIEWS] Review {} stored but picture lookup failed: {e}", inserted.id);
            AppError::ReviewNotDisplayed(e)
        })?;

    Ok(enrich(
        inserted,
        &profiles,
        &pictures,
        default_pic,
        Confirmation::Unconfirmed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryStore, Operation};
    use serde_json::json;

    fn author() -> Author {
        Author {
            id: Uuid::new_v4(),
            username: "szokevenyes".into(),
        }
    }

    #[test]
    fn validation_bounds() {
        assert!(matches!(validate("0", "ok"), Err(AppError::InvalidRating(_))));
        assert!(matches!(validate("6", "ok"), Err(AppError::InvalidRating(_))));
        assert!(matches!(validate("4.5", "ok"), Err(AppError::InvalidRating(_))));
        assert!(matches!(validate("", "ok"), Err(AppError::InvalidRating(_))));
        assert_eq!(validate("3", "   "), Err(AppError::EmptyComment));
        assert_eq!(
            validate(" 5 ", " Jó játék "),
            Ok(ValidReview {
                rating: 5,
                comment: "Jó játék".into()
            })
        );
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_store() {
        let store = MemoryStore::new();
        let author = author();

        for (rating, comment) in [("0", "x"), ("6", "x"), ("3", "")] {
            assert!(submit_review(&store, Some(&author), rating, comment, "d").await.is_err());
        }
        assert_eq!(
            submit_review(&store, None, "5", "x", "d").await,
            Err(AppError::NotSignedIn)
        );
        let nameless = Author {
            username: String::new(),
            ..author
        };
        assert_eq!(
            submit_review(&store, Some(&nameless), "5", "x", "d").await,
            Err(AppError::NotSignedIn)
        );
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn stores_the_stable_author_id() {
        let store = MemoryStore::new();
        let author = author();
        store.seed(Table::Profiles, new_profile(&author));
        store.seed(
            Table::ProfilePics,
            json!({"user_id": author.id, "file_name": "p.png", "public_url": "pic"}),
        );

        let review = submit_review(&store, Some(&author), "4", "Izgalmas!", "d")
            .await
            .unwrap();

        assert_eq!(review.review.user_id, Some(author.id));
        assert_eq!(review.review.rating, 4);
        assert_eq!(review.profile_pic, "pic");
        assert_eq!(review.confirmation, Confirmation::Unconfirmed);
        assert_eq!(store.rows(Table::Reviews).len(), 1);
    }

    #[tokio::test]
    async fn a_missing_picture_is_not_an_error() {
        let store = MemoryStore::new();
        let author = author();
        store.seed(Table::Profiles, new_profile(&author));

        let review = submit_review(&store, Some(&author), "5", "x", "default")
            .await
            .unwrap();

        assert_eq!(review.profile_pic, "default");
    }

    #[tokio::test]
    async fn lookup_failure_after_insert_reports_persisted() {
        let store = MemoryStore::new();
        let author = author();
        store.seed(Table::Profiles, new_profile(&author));
        store.fail_on(Table::ProfilePics, Operation::Select);

        let err = submit_review(&store, Some(&author), "5", "x", "d")
            .await
            .unwrap_err();

        assert!(err.persisted());
        assert_eq!(store.rows(Table::Reviews).len(), 1);
    }

    #[tokio::test]
    async fn insert_failure_is_not_persisted() {
        let store = MemoryStore::new();
        store.fail_on(Table::Reviews, Operation::Insert);

        let err = submit_review(&store, Some(&author()), "5", "x", "d")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Remote { .. }));
        assert!(!err.persisted());
    }

    fn new_profile(author: &Author) -> serde_json::Value {
        json!({"id": author.id, "username": author.username, "email": "a@xcape.hu"})
    }
}
