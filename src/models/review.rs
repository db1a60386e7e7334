// src/models/review.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row of the `reviews` table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Review {
    pub id: i64,
    // Stable author id; `None` on rows written before the column existed
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub username: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Payload inserted into `reviews`; the store assigns `id` and `created_at`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewReview {
    pub user_id: Uuid,
    pub username: String,
    pub rating: i32,
    pub comment: String,
}

/// Whether a displayed review has been seen in an authoritative load.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    /// Prepended locally after a submission; the next full load confirms it.
    Unconfirmed,
}

/// A review joined with its author's picture, ready for display.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnrichedReview {
    #[serde(flatten)]
    pub review: Review,
    pub profile_pic: String,
    pub confirmation: Confirmation,
}

impl EnrichedReview {
    pub fn is_confirmed(&self) -> bool {
        self.confirmation == Confirmation::Confirmed
    }
}
