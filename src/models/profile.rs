// src/models/profile.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row of the `profiles` table. `id` matches the identity provider's user id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// The join columns of a profile, as fetched by the review pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProfileRef {
    pub id: Uuid,
    pub username: String,
}

/// A row of the `profile_pics` table; at most one per `user_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProfilePicture {
    pub user_id: Uuid,
    #[serde(default)]
    pub file_name: String,
    pub public_url: String,
}
