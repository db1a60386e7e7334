//! Sign-in, registration and profile editing.

use chrono::Utc;
use leptos::logging::{error, log};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::backend::{
    fetch_optional, Backend, BackendError, Filter, RelationalStore, Select, Table,
};
use crate::error::AppError;
use crate::models::profile::Profile;
use crate::models::session::{AuthUser, Session, UserMetadata, UserUpdate};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
struct EmailRow {
    email: String,
}

#[derive(Deserialize)]
struct IdRow {
    id: Uuid,
}

#[derive(Deserialize)]
struct PictureUrlRow {
    public_url: String,
}

/// Signs in with a display name instead of an email address.
pub async fn sign_in_with_username(
    backend: &Backend,
    username: &str,
    password: &str,
) -> Result<Session, AppError> {
    let (username, password) = (username.trim(), password.trim());
    if username.is_empty() || password.is_empty() {
        return Err(AppError::MissingCredentials);
    }

    let query = Select::on(Table::Profiles)
        .columns(&["email"])
        .filter(Filter::ilike("username", username));
    let profile: Option<EmailRow> = fetch_optional(backend.store.as_ref(), &query)
        .await
        .map_err(AppError::remote("looking up the username"))?;
    let email = profile
        .ok_or_else(|| AppError::UnknownUsername(username.to_string()))?
        .email;

    match backend.identity.sign_in_with_password(&email, password).await {
        Ok(session) => {
            log!("[AUTH] Signed in as {username}");
            Ok(session)
        }
        Err(BackendError::InvalidCredentials) => Err(AppError::InvalidCredentials),
        Err(e) => {
            error!("[AUTH] Sign-in failed: {e}");
            Err(AppError::remote("signing in")(e))
        }
    }
}

/// Creates the auth account and its profile row.
pub async fn register(
    backend: &Backend,
    username: &str,
    email: &str,
    password: &str,
) -> Result<AuthUser, AppError> {
    let (username, email) = (username.trim(), email.trim());
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::MissingRegistrationFields);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }

    let store = backend.store.as_ref();
    if profile_exists(store, Filter::eq("username", username)).await? {
        return Err(AppError::UsernameTaken(username.to_string()));
    }
    if profile_exists(store, Filter::eq("email", email)).await? {
        return Err(AppError::EmailTaken(email.to_string()));
    }

    let metadata = UserMetadata {
        username: Some(username.to_string()),
    };
    let user = backend
        .identity
        .sign_up(email, password, metadata)
        .await
        .map_err(|e| match e {
            BackendError::Rejected { status: 422, .. } => AppError::EmailTaken(email.to_string()),
            other => AppError::remote("creating the account")(other),
        })?;

    let profile = json!({ "id": user.id, "username": username, "email": email });
    store
        .upsert(Table::Profiles, profile, "id")
        .await
        .map_err(|e| {
            error!("[AUTH] Account {} created but profile upsert failed: {e}", user.id);
            AppError::remote("saving the profile")(e)
        })?;
    log!("[AUTH] Registered {username}");
    Ok(user)
}

async fn profile_exists(store: &dyn RelationalStore, filter: Filter) -> Result<bool, AppError> {
    let query = Select::on(Table::Profiles).columns(&["id"]).filter(filter);
    let row: Option<IdRow> = fetch_optional(store, &query)
        .await
        .map_err(AppError::remote("checking availability"))?;
    Ok(row.is_some())
}

pub async fn sign_out(backend: &Backend) -> Result<(), AppError> {
    backend
        .identity
        .sign_out()
        .await
        .map_err(AppError::remote("signing out"))?;
    log!("[AUTH] Signed out");
    Ok(())
}

/// The profile of `user`, built from the auth record when the row is missing
/// or unreadable.
pub async fn load_profile(store: &dyn RelationalStore, user: &AuthUser) -> Profile {
    let fallback = || Profile {
        id: user.id,
        username: user.user_metadata.username.clone().unwrap_or_default(),
        email: user.email.clone().unwrap_or_default(),
    };
    let query = Select::on(Table::Profiles)
        .columns(&["id", "username", "email"])
        .filter(Filter::eq("id", user.id.to_string()));
    match fetch_optional::<Profile>(store, &query).await {
        Ok(Some(mut profile)) => {
            if profile.email.is_empty() {
                profile.email = user.email.clone().unwrap_or_default();
            }
            profile
        }
        Ok(None) => fallback(),
        Err(e) => {
            error!("[AUTH] Profile lookup failed, using auth metadata: {e}");
            fallback()
        }
    }
}

/// The current picture URL of `user_id`, if one was uploaded.
pub async fn load_profile_picture(
    store: &dyn RelationalStore,
    user_id: Uuid,
) -> Result<Option<String>, AppError> {
    let query = Select::on(Table::ProfilePics)
        .columns(&["public_url"])
        .filter(Filter::eq("user_id", user_id.to_string()));
    let row: Option<PictureUrlRow> = fetch_optional(store, &query)
        .await
        .map_err(AppError::remote("loading the profile picture"))?;
    Ok(row.map(|row| row.public_url))
}

pub async fn update_email(backend: &Backend, user_id: Uuid, email: &str) -> Result<(), AppError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::MissingField("email cím"));
    }

    let update = UserUpdate {
        email: Some(email.to_string()),
        metadata: None,
    };
    backend
        .identity
        .update_user(update)
        .await
        .map_err(AppError::remote("updating the login email"))?;
    backend
        .store
        .update(
            Table::Profiles,
            &[Filter::eq("id", user_id.to_string())],
            json!({ "email": email }),
        )
        .await
        .map_err(AppError::remote("updating the profile email"))?;
    log!("[AUTH] Email updated for {user_id}");
    Ok(())
}

/// Renames the user. Reviews written earlier keep resolving through the
/// stable user id.
pub async fn update_username(
    backend: &Backend,
    user_id: Uuid,
    username: &str,
) -> Result<(), AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::MissingField("felhasználónév"));
    }

    let query = Select::on(Table::Profiles)
        .columns(&["id"])
        .filter(Filter::ilike("username", username));
    let holder: Option<IdRow> = fetch_optional(backend.store.as_ref(), &query)
        .await
        .map_err(AppError::remote("checking availability"))?;
    if holder.is_some_and(|row| row.id != user_id) {
        return Err(AppError::UsernameTaken(username.to_string()));
    }

    backend
        .store
        .upsert(
            Table::Profiles,
            json!({ "id": user_id, "username": username }),
            "id",
        )
        .await
        .map_err(AppError::remote("updating the profile"))?;
    let update = UserUpdate {
        email: None,
        metadata: Some(UserMetadata {
            username: Some(username.to_string()),
        }),
    };
    backend
        .identity
        .update_user(update)
        .await
        .map_err(AppError::remote("updating the account"))?;
    log!("[AUTH] Username of {user_id} is now {username}");
    Ok(())
}

/// Object path for a new picture: unique per upload, extension kept.
pub fn picture_path(user_id: Uuid, file_name: &str, unix_millis: i64) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("png");
    format!("{user_id}-{unix_millis}.{ext}")
}

/// Uploads a picture and points the user's `profile_pics` row at it.
/// Returns the public URL.
pub async fn upload_profile_picture(
    backend: &Backend,
    bucket: &str,
    user_id: Uuid,
    file_name: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<String, AppError> {
    if bytes.is_empty() {
        return Err(AppError::NoFileSelected);
    }

    let path = picture_path(user_id, file_name, Utc::now().timestamp_millis());
    backend
        .storage
        .upload(bucket, &path, bytes, content_type, true)
        .await
        .map_err(|e| {
            error!("[AUTH] Picture upload to {bucket}/{path} failed: {e}");
            AppError::remote("uploading the picture")(e)
        })?;
    let public_url = backend.storage.public_url(bucket, &path);

    let row = json!({ "user_id": user_id, "file_name": path, "public_url": public_url });
    backend
        .store
        .upsert(Table::ProfilePics, row, "user_id")
        .await
        .map_err(AppError::remote("saving the picture"))?;
    log!("[AUTH] Profile picture of {user_id} is now {path}");
    Ok(public_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Operation};
    use crate::backend::IdentityProvider;

    fn seeded() -> (MemoryBackend, AuthUser) {
        let memory = MemoryBackend::new();
        let user = memory.identity.add_account("rab@xcape.hu", "titok123", "Rab");
        memory.store.seed(
            Table::Profiles,
            json!({"id": user.id, "username": "Rab", "email": "rab@xcape.hu"}),
        );
        (memory, user)
    }

    #[tokio::test]
    async fn username_sign_in_is_case_insensitive() {
        let (memory, user) = seeded();

        let session = sign_in_with_username(&memory.backend(), " rab ", "titok123")
            .await
            .unwrap();

        assert_eq!(session.user.id, user.id);
    }

    #[tokio::test]
    async fn sign_in_errors() {
        let (memory, _) = seeded();
        let backend = memory.backend();

        assert_eq!(
            sign_in_with_username(&backend, "", "x").await,
            Err(AppError::MissingCredentials)
        );
        assert_eq!(memory.remote_calls(), 0);
        assert_eq!(
            sign_in_with_username(&backend, "senki", "x").await,
            Err(AppError::UnknownUsername("senki".into()))
        );
        assert_eq!(
            sign_in_with_username(&backend, "Rab", "rossz").await,
            Err(AppError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn register_creates_account_and_profile() {
        let memory = MemoryBackend::new();

        let user = register(&memory.backend(), " Uj ", "uj@xcape.hu", "hosszu1")
            .await
            .unwrap();

        assert_eq!(user.user_metadata.username.as_deref(), Some("Uj"));
        let profiles = memory.store.rows(Table::Profiles);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0]["username"], "Uj");
        assert_eq!(profiles[0]["email"], "uj@xcape.hu");
    }

    #[tokio::test]
    async fn register_rejects_before_signing_up() {
        let (memory, _) = seeded();
        let backend = memory.backend();

        assert_eq!(
            register(&backend, "x", "x@xcape.hu", "12345").await,
            Err(AppError::PasswordTooShort { min: 6 })
        );
        assert_eq!(memory.remote_calls(), 0);
        assert_eq!(
            register(&backend, "Rab", "masik@xcape.hu", "123456").await,
            Err(AppError::UsernameTaken("Rab".into()))
        );
        assert_eq!(
            register(&backend, "Masik", "rab@xcape.hu", "123456").await,
            Err(AppError::EmailTaken("rab@xcape.hu".into()))
        );
        assert_eq!(memory.store.rows(Table::Profiles).len(), 1);
    }

    #[tokio::test]
    async fn profile_falls_back_to_auth_metadata() {
        let memory = MemoryBackend::new();
        let user = memory.identity.add_account("nincs@xcape.hu", "titok123", "Nincs");

        let profile = load_profile(memory.store.as_ref(), &user).await;
        assert_eq!(profile.username, "Nincs");
        assert_eq!(profile.email, "nincs@xcape.hu");

        memory.store.fail_on(Table::Profiles, Operation::Select);
        assert_eq!(load_profile(memory.store.as_ref(), &user).await, profile);
    }

    #[tokio::test]
    async fn rename_updates_profile_and_metadata() {
        let (memory, user) = seeded();
        let backend = memory.backend();
        memory.identity.sign_in_with_password("rab@xcape.hu", "titok123").await.unwrap();

        update_username(&backend, user.id, "Szabad").await.unwrap();

        assert_eq!(memory.store.rows(Table::Profiles)[0]["username"], "Szabad");
        let current = memory.identity.current_user().await.unwrap().unwrap();
        assert_eq!(current.user_metadata.username.as_deref(), Some("Szabad"));
    }

    #[tokio::test]
    async fn rename_to_a_taken_name_fails() {
        let (memory, user) = seeded();
        memory.store.seed(
            Table::Profiles,
            json!({"id": Uuid::new_v4(), "username": "Foglalt", "email": "f@xcape.hu"}),
        );

        assert_eq!(
            update_username(&memory.backend(), user.id, "foglalt").await,
            Err(AppError::UsernameTaken("foglalt".into()))
        );
    }

    #[tokio::test]
    async fn email_change_reaches_both_records() {
        let (memory, user) = seeded();
        memory.identity.sign_in_with_password("rab@xcape.hu", "titok123").await.unwrap();

        update_email(&memory.backend(), user.id, "uj@xcape.hu").await.unwrap();

        assert_eq!(memory.store.rows(Table::Profiles)[0]["email"], "uj@xcape.hu");
        let current = memory.identity.current_user().await.unwrap().unwrap();
        assert_eq!(current.email.as_deref(), Some("uj@xcape.hu"));
    }

    #[tokio::test]
    async fn upload_replaces_the_previous_picture_row() {
        let (memory, user) = seeded();
        let backend = memory.backend();

        let first = upload_profile_picture(&backend, "profile-pics", user.id, "a.jpg", vec![1], "image/jpeg")
            .await
            .unwrap();
        let second = upload_profile_picture(&backend, "profile-pics", user.id, "b.png", vec![2], "image/png")
            .await
            .unwrap();

        let pics = memory.store.rows(Table::ProfilePics);
        assert_eq!(pics.len(), 1);
        assert_eq!(pics[0]["public_url"], second.as_str());
        assert!(first.ends_with(".jpg"));
        assert_eq!(
            load_profile_picture(memory.store.as_ref(), user.id).await,
            Ok(Some(second))
        );
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let (memory, user) = seeded();
        assert_eq!(
            upload_profile_picture(&memory.backend(), "profile-pics", user.id, "a.png", Vec::new(), "image/png").await,
            Err(AppError::NoFileSelected)
        );
        assert_eq!(memory.remote_calls(), 0);
    }

    #[test]
    fn picture_paths_keep_the_extension() {
        let id = Uuid::nil();
        assert_eq!(
            picture_path(id, "me.webp", 1700000000000),
            format!("{id}-1700000000000.webp")
        );
        assert_eq!(picture_path(id, "noext", 1), format!("{id}-1.png"));
    }
}
