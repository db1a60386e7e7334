//! The three-stage load: reviews, then the profiles they reference, then
//! those profiles' pictures, joined into the displayed list.

use std::collections::{BTreeSet, HashMap};

use leptos::logging::{error, log};
use uuid::Uuid;

use crate::backend::{fetch, BackendError, Filter, RelationalStore, Select, Table};
use crate::error::AppError;
use crate::models::profile::{ProfilePicture, ProfileRef};
use crate::models::review::{Confirmation, EnrichedReview, Review};

/// Stage 1 output, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedReviews(pub Vec<Review>);

/// Authors referenced by a set of reviews. Rows with a stable id are
/// resolved by id; older rows only carry a display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorRefs {
    pub ids: BTreeSet<Uuid>,
    pub names: BTreeSet<String>,
}

impl AuthorRefs {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.names.is_empty()
    }

    fn filter(&self) -> Filter {
        let by_id = Filter::is_in("id", self.ids.iter().map(Uuid::to_string));
        let by_name = Filter::is_in("username", self.names.iter().cloned());
        match (self.ids.is_empty(), self.names.is_empty()) {
            (false, true) => by_id,
            (true, false) => by_name,
            _ => Filter::Or(vec![by_id, by_name]),
        }
    }
}

impl FetchedReviews {
    pub fn author_refs(&self) -> AuthorRefs {
        let mut refs = AuthorRefs::default();
        for review in &self.0 {
            match review.user_id {
                Some(id) => {
                    refs.ids.insert(id);
                }
                None => {
                    refs.names.insert(review.username.clone());
                }
            }
        }
        refs
    }
}

/// Stage 2 output, indexed both ways.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorProfiles {
    by_id: HashMap<Uuid, ProfileRef>,
    id_by_name: HashMap<String, Uuid>,
}

impl AuthorProfiles {
    pub fn new(profiles: Vec<ProfileRef>) -> Self {
        let mut index = AuthorProfiles::default();
        for profile in profiles {
            index.id_by_name.insert(profile.username.clone(), profile.id);
            index.by_id.insert(profile.id, profile);
        }
        index
    }

    pub fn ids(&self) -> BTreeSet<Uuid> {
        self.by_id.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// The profile that wrote `review`, if it still exists.
    pub fn author_of(&self, review: &Review) -> Option<&ProfileRef> {
        match review.user_id {
            Some(id) => self.by_id.get(&id),
            None => self
                .id_by_name
                .get(&review.username)
                .and_then(|id| self.by_id.get(id)),
        }
    }
}

/// Stage 3 output: picture URL per profile id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorPictures(HashMap<Uuid, String>);

impl AuthorPictures {
    pub fn new(pictures: Vec<ProfilePicture>) -> Self {
        AuthorPictures(
            pictures
                .into_iter()
                .map(|picture| (picture.user_id, picture.public_url))
                .collect(),
        )
    }

    pub fn url_for(&self, profile_id: Uuid) -> Option<&str> {
        self.0.get(&profile_id).map(String::as_str)
    }
}

pub async fn fetch_reviews(store: &dyn RelationalStore) -> Result<FetchedReviews, BackendError> {
    let query = Select::on(Table::Reviews)
        .columns(&["id", "user_id", "username", "rating", "comment", "created_at"])
        .order_by("id", false);
    fetch(store, &query).await.map(FetchedReviews)
}

/// Fetches exactly the referenced profiles; no call when nothing is referenced.
pub async fn fetch_author_profiles(
    store: &dyn RelationalStore,
    refs: &AuthorRefs,
) -> Result<AuthorProfiles, BackendError> {
    if refs.is_empty() {
        return Ok(AuthorProfiles::default());
    }
    let query = Select::on(Table::Profiles)
        .columns(&["id", "username"])
        .filter(refs.filter());
    fetch(store, &query).await.map(AuthorProfiles::new)
}

/// Fetches exactly the pictures owned by `profile_ids`.
pub async fn fetch_author_pictures(
    store: &dyn RelationalStore,
    profile_ids: &BTreeSet<Uuid>,
) -> Result<AuthorPictures, BackendError> {
    if profile_ids.is_empty() {
        return Ok(AuthorPictures::default());
    }
    let query = Select::on(Table::ProfilePics)
        .columns(&["user_id", "public_url"])
        .filter(Filter::is_in("user_id", profile_ids.iter().map(Uuid::to_string)));
    fetch(store, &query).await.map(AuthorPictures::new)
}

/// Attaches a picture to one review, falling back to `default_pic`.
pub fn enrich(
    review: Review,
    profiles: &AuthorProfiles,
    pictures: &AuthorPictures,
    default_pic: &str,
    confirmation: Confirmation,
) -> EnrichedReview {
    let profile_pic = profiles
        .author_of(&review)
        .and_then(|profile| pictures.url_for(profile.id))
        .unwrap_or(default_pic)
        .to_string();
    EnrichedReview {
        review,
        profile_pic,
        confirmation,
    }
}

pub fn join(
    reviews: FetchedReviews,
    profiles: &AuthorProfiles,
    pictures: &AuthorPictures,
    default_pic: &str,
) -> Vec<EnrichedReview> {
    reviews
        .0
        .into_iter()
        .map(|review| enrich(review, profiles, pictures, default_pic, Confirmation::Confirmed))
        .collect()
}

/// Loads the complete display list. Any stage failing fails the whole load,
/// so callers never show a partially joined list.
pub async fn load_reviews(
    store: &dyn RelationalStore,
    default_pic: &str,
) -> Result<Vec<EnrichedReview>, AppError> {
    let reviews = fetch_reviews(store).await.map_err(|e| {
        error!("[REVIEWS] Failed to fetch reviews: {e}");
        AppError::remote("loading reviews")(e)
    })?;
    log!("[REVIEWS] Fetched {} reviews", reviews.0.len());

    let profiles = fetch_author_profiles(store, &reviews.author_refs())
        .await
        .map_err(|e| {
            error!("[REVIEWS] Failed to fetch profiles: {e}");
            AppError::remote("loading review authors")(e)
        })?;
    log!("[REVIEWS] Resolved {} author profiles", profiles.len());

    let pictures = fetch_author_pictures(store, &profiles.ids())
        .await
        .map_err(|e| {
            error!("[REVIEWS] Failed to fetch profile pictures: {e}");
            AppError::remote("loading profile pictures")(e)
        })?;

    Ok(join(reviews, &profiles, &pictures, default_pic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryStore, Operation};
    use chrono::Utc;
    use serde_json::json;

    const DEFAULT_PIC: &str = "default.png";

    fn seed_review(store: &MemoryStore, id: i64, username: &str, user_id: Option<Uuid>) {
        store.seed(
            Table::Reviews,
            json!({
                "id": id,
                "user_id": user_id,
                "username": username,
                "rating": 4,
                "comment": format!("review {id}"),
                "created_at": Utc::now(),
            }),
        );
    }

    #[tokio::test]
    async fn joins_pictures_by_display_name_for_legacy_rows() {
        let store = MemoryStore::new();
        let (id1, id2) = (Uuid::new_v4(), Uuid::new_v4());
        seed_review(&store, 1, "a", None);
        seed_review(&store, 2, "b", None);
        store.seed(Table::Profiles, json!({"id": id1, "username": "a", "email": "a@x.hu"}));
        store.seed(Table::Profiles, json!({"id": id2, "username": "b", "email": "b@x.hu"}));
        store.seed(Table::ProfilePics, json!({"user_id": id1, "file_name": "a.png", "public_url": "url1"}));

        let reviews = load_reviews(&store, DEFAULT_PIC).await.unwrap();

        let pics: Vec<(&str, &str)> = reviews
            .iter()
            .map(|r| (r.review.username.as_str(), r.profile_pic.as_str()))
            .collect();
        assert_eq!(pics, vec![("b", DEFAULT_PIC), ("a", "url1")]);
        assert!(reviews.iter().all(EnrichedReview::is_confirmed));
    }

    #[tokio::test]
    async fn stable_ids_survive_a_rename() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        seed_review(&store, 1, "old-name", Some(author));
        store.seed(Table::Profiles, json!({"id": author, "username": "new-name", "email": ""}));
        store.seed(Table::ProfilePics, json!({"user_id": author, "file_name": "p.png", "public_url": "url"}));

        let reviews = load_reviews(&store, DEFAULT_PIC).await.unwrap();

        assert_eq!(reviews[0].profile_pic, "url");
    }

    #[tokio::test]
    async fn unknown_authors_fall_back_to_the_default_picture() {
        let store = MemoryStore::new();
        seed_review(&store, 1, "deleted-user", None);
        seed_review(&store, 2, "ghost", Some(Uuid::new_v4()));

        let reviews = load_reviews(&store, DEFAULT_PIC).await.unwrap();

        assert_eq!(reviews.len(), 2);
        assert!(reviews.iter().all(|r| r.profile_pic == DEFAULT_PIC));
    }

    #[tokio::test]
    async fn an_empty_feed_skips_the_dependent_stages() {
        let store = MemoryStore::new();
        store.fail_on(Table::Profiles, Operation::Select);
        store.fail_on(Table::ProfilePics, Operation::Select);

        let reviews = load_reviews(&store, DEFAULT_PIC).await.unwrap();

        assert!(reviews.is_empty());
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn a_failing_stage_fails_the_whole_load() {
        for table in [Table::Reviews, Table::Profiles, Table::ProfilePics] {
            let store = MemoryStore::new();
            let id = Uuid::new_v4();
            seed_review(&store, 1, "a", None);
            store.seed(Table::Profiles, json!({"id": id, "username": "a", "email": ""}));
            store.fail_on(table, Operation::Select);

            let result = load_reviews(&store, DEFAULT_PIC).await;

            assert!(
                matches!(result, Err(AppError::Remote { .. })),
                "failure in {table} must abort the load"
            );
        }
    }

    #[test]
    fn author_refs_split_ids_from_legacy_names() {
        let id = Uuid::new_v4();
        let review = |user_id, username: &str| Review {
            id: 1,
            user_id,
            username: username.to_string(),
            rating: 5,
            comment: String::new(),
            created_at: Utc::now(),
        };
        let fetched = FetchedReviews(vec![review(Some(id), "a"), review(None, "b"), review(None, "b")]);

        let refs = fetched.author_refs();

        assert_eq!(refs.ids, BTreeSet::from([id]));
        assert_eq!(refs.names, BTreeSet::from(["b".to_string()]));
        assert!(matches!(refs.filter(), Filter::Or(_)));
    }
}
