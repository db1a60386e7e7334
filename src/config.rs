use std::{env, fmt::Display, str::FromStr};

use leptos::logging::{log, warn};

pub const DEFAULT_PROFILE_PIC: &str =
    "https://encrypted-tbn0.gstatic.com/images?q=tbn:ANd9GcSA4F3geRPsxdg2QCVXw-WZrwjWUoJFDWhh2w&s";
pub const PROFILE_PIC_BUCKET: &str = "profile-pics";
const LOCAL_SUPABASE_URL: &str = "http://127.0.0.1:54321";

/// Where the server-side review API reads its rows from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    Supabase,
    Sqlite { path: String },
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once(':') {
            None if value == "supabase" => Ok(StoreKind::Supabase),
            Some(("sqlite", path)) if !path.is_empty() => Ok(StoreKind::Sqlite {
                path: path.to_string(),
            }),
            _ => Err(format!(
                "expected 'supabase' or 'sqlite:<path>', got '{value}'"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub profile_pic_bucket: String,
    pub default_profile_pic: String,
    pub game_download_url: String,
    pub store: StoreKind,
}

impl SiteConfig {
    /// Server configuration from `XCAPE_*` environment variables.
    pub fn from_env() -> Self {
        let supabase_url: String = try_load("XCAPE_SUPABASE_URL", LOCAL_SUPABASE_URL.to_string());
        Self {
            game_download_url: try_load("XCAPE_GAME_URL", default_game_url(&supabase_url)),
            supabase_anon_key: try_load("XCAPE_SUPABASE_ANON_KEY", String::new()),
            profile_pic_bucket: try_load("XCAPE_PROFILE_PIC_BUCKET", PROFILE_PIC_BUCKET.to_string()),
            default_profile_pic: try_load("XCAPE_DEFAULT_PROFILE_PIC", DEFAULT_PROFILE_PIC.to_string()),
            store: try_load("XCAPE_STORE", StoreKind::Supabase),
            supabase_url,
        }
    }

    /// Browser configuration, baked into the bundle at compile time.
    pub fn embedded() -> Self {
        let supabase_url = option_env!("XCAPE_SUPABASE_URL")
            .unwrap_or(LOCAL_SUPABASE_URL)
            .to_string();
        Self {
            game_download_url: option_env!("XCAPE_GAME_URL")
                .map(str::to_string)
                .unwrap_or_else(|| default_game_url(&supabase_url)),
            supabase_anon_key: option_env!("XCAPE_SUPABASE_ANON_KEY")
                .unwrap_or_default()
                .to_string(),
            profile_pic_bucket: option_env!("XCAPE_PROFILE_PIC_BUCKET")
                .unwrap_or(PROFILE_PIC_BUCKET)
                .to_string(),
            default_profile_pic: option_env!("XCAPE_DEFAULT_PROFILE_PIC")
                .unwrap_or(DEFAULT_PROFILE_PIC)
                .to_string(),
            supabase_url,
            store: StoreKind::Supabase,
        }
    }
}

fn default_game_url(supabase_url: &str) -> String {
    format!(
        "{}/storage/v1/object/public/game/xcapeout.rar",
        supabase_url.trim_end_matches('/')
    )
}

fn try_load<T: FromStr>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    let Ok(raw) = env::var(key) else {
        log!("[CONFIG] {key} not set, using default");
        return default;
    };
    raw.parse().unwrap_or_else(|e| {
        warn!("[CONFIG] Invalid {key} value ({e}), using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_kind_parses_both_forms() {
        assert_eq!("supabase".parse::<StoreKind>(), Ok(StoreKind::Supabase));
        assert_eq!(
            "sqlite:xcape.db".parse::<StoreKind>(),
            Ok(StoreKind::Sqlite {
                path: "xcape.db".into()
            })
        );
        assert!("sqlite:".parse::<StoreKind>().is_err());
        assert!("postgres".parse::<StoreKind>().is_err());
    }

    #[test]
    fn game_url_points_at_the_public_bucket() {
        assert_eq!(
            default_game_url("https://abc.supabase.co/"),
            "https://abc.supabase.co/storage/v1/object/public/game/xcapeout.rar"
        );
    }
}
