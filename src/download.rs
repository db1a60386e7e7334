use serde::{Deserialize, Serialize};

use crate::identity::IdentityState;
use crate::models::session::Principal;

/// What the download page may offer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum DownloadAccess {
    /// The session has not been checked yet.
    Pending,
    Granted { url: String },
    SignInRequired,
}

impl DownloadAccess {
    pub fn for_principal(principal: Option<&Principal>, game_url: &str) -> Self {
        match principal {
            Some(_) => DownloadAccess::Granted {
                url: game_url.to_string(),
            },
            None => DownloadAccess::SignInRequired,
        }
    }

    pub fn for_state(state: &IdentityState, game_url: &str) -> Self {
        if !state.initialized {
            return DownloadAccess::Pending;
        }
        Self::for_principal(state.principal.as_ref(), game_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const URL: &str = "https://cdn.xcape.hu/xcapeout.rar";

    #[test]
    fn only_signed_in_users_get_the_link() {
        let principal = Principal {
            id: Uuid::new_v4(),
            email: "a@xcape.hu".into(),
        };
        assert_eq!(
            DownloadAccess::for_principal(Some(&principal), URL),
            DownloadAccess::Granted { url: URL.into() }
        );
        assert_eq!(
            DownloadAccess::for_principal(None, URL),
            DownloadAccess::SignInRequired
        );
    }

    #[test]
    fn waits_for_the_initial_session_check() {
        let mut state = IdentityState::default();
        assert_eq!(DownloadAccess::for_state(&state, URL), DownloadAccess::Pending);

        state.initialized = true;
        assert_eq!(
            DownloadAccess::for_state(&state, URL),
            DownloadAccess::SignInRequired
        );
    }
}
