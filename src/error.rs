use thiserror::Error;

use crate::backend::BackendError;
use crate::notice::Notice;

/// Failures of the site's user-facing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("sign-in required")]
    NotSignedIn,
    #[error("rating must be a whole number between 1 and 5, got '{0}'")]
    InvalidRating(String),
    #[error("comment must not be empty")]
    EmptyComment,
    #[error("username and password are required")]
    MissingCredentials,
    #[error("username, email and password are required")]
    MissingRegistrationFields,
    #[error("password must be at least {min} characters long")]
    PasswordTooShort { min: usize },
    #[error("no account uses the username '{0}'")]
    UnknownUsername(String),
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("email '{0}' is already registered")]
    EmailTaken(String),
    #[error("wrong username or password")]
    InvalidCredentials,
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("no file was selected")]
    NoFileSelected,
    /// A remote call failed; nothing was changed locally.
    #[error("{context}: {source}")]
    Remote {
        context: &'static str,
        #[source]
        source: BackendError,
    },
    /// The review row was stored but its author could not be resolved, so it
    /// is not shown until the next full load.
    #[error("review saved but could not be displayed: {0}")]
    ReviewNotDisplayed(#[source] BackendError),
}

impl AppError {
    /// Wraps a backend error with the step that was running.
    pub fn remote(context: &'static str) -> impl FnOnce(BackendError) -> AppError {
        move |source| AppError::Remote { context, source }
    }

    /// Whether the failed operation nevertheless persisted data remotely.
    pub fn persisted(&self) -> bool {
        matches!(self, AppError::ReviewNotDisplayed(_))
    }

    /// The transient notice shown to the user for this error.
    pub fn notice(&self) -> Notice {
        match self {
            AppError::NotSignedIn => Notice::warning(
                "Bejelentkezés szükséges",
                "Kérlek, jelentkezz be az értékeléshez!",
            ),
            AppError::InvalidRating(_) => {
                Notice::warning("Érvénytelen értékelés", "Az értékelés 1 és 5 közötti egész szám lehet.")
            }
            AppError::EmptyComment => Notice::warning("Hiányzó komment", "Kérlek, írj egy kommentet!"),
            AppError::MissingCredentials => Notice::warning(
                "Hiányzó adatok",
                "Kérlek, töltsd ki a felhasználónevet és a jelszót!",
            ),
            AppError::MissingRegistrationFields => {
                Notice::warning("Hiányzó adatok", "Kérlek, tölts ki minden mezőt!")
            }
            AppError::PasswordTooShort { min } => Notice::warning(
                "A jelszó túl rövid.",
                format!("A jelszónak legalább {min} karakterből kell állnia."),
            ),
            AppError::UnknownUsername(_) => {
                Notice::warning("Hiba", "A megadott felhasználónév nem létezik.")
            }
            AppError::UsernameTaken(_) => Notice::error("Hiba", "A felhasználónév már foglalt."),
            AppError::EmailTaken(_) => Notice::error("Hiba", "Ez az email cím már regisztrálva van."),
            AppError::InvalidCredentials => {
                Notice::warning("Helytelen adatok", "Hibás felhasználónév vagy jelszó.")
            }
            AppError::MissingField(field) => {
                Notice::warning("Hiányzó adat", format!("Kérlek, add meg: {field}."))
            }
            AppError::NoFileSelected => Notice::warning("Nincs kép", "Válassz ki egy képet!"),
            AppError::Remote { context, .. } => Notice::error(
                "Sikertelen művelet.",
                format!("Hiba történt: {context}. Kérlek, próbáld újra később!"),
            ),
            AppError::ReviewNotDisplayed(_) => Notice::error(
                "Sikertelen beküldés.",
                "Hiba történt az értékelés beküldése közben.",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeLevel;

    #[test]
    fn validation_errors_are_warnings() {
        assert_eq!(AppError::NotSignedIn.notice().level, NoticeLevel::Warning);
        assert_eq!(AppError::EmptyComment.notice().level, NoticeLevel::Warning);
        assert_eq!(
            AppError::PasswordTooShort { min: 6 }.notice().description,
            "A jelszónak legalább 6 karakterből kell állnia."
        );
    }

    #[test]
    fn only_post_insert_failures_count_as_persisted() {
        let backend = BackendError::not_found("profile");
        assert!(AppError::ReviewNotDisplayed(backend.clone()).persisted());
        assert!(!AppError::remote("loading reviews")(backend).persisted());
    }
}
