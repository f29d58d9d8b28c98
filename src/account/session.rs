use std::sync::Arc;

use crate::api::ApiFetcher;
use crate::auth::UserId;

/// User id reported by guest sessions. Real accounts never use it.
pub const GUEST_USER_ID: UserId = 0;

#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: UserId,
    pub api_fetcher: Arc<ApiFetcher>,
}

/// Ephemeral session used before (or instead of) signing in.
#[derive(Debug, Clone)]
pub struct GuestSession {
    pub api_fetcher: Arc<ApiFetcher>,
}

/// A user's connection to the backend.
///
/// Sessions are immutable and shared as `Arc<Session>`; a token change
/// produces a new session rather than mutating this one.
#[derive(Debug, Clone)]
pub enum Session {
    User(UserSession),
    Guest(GuestSession),
}

impl Session {
    pub fn user(user_id: UserId, api_fetcher: Arc<ApiFetcher>) -> Self {
        Self::User(UserSession {
            user_id,
            api_fetcher,
        })
    }

    pub fn guest(api_fetcher: Arc<ApiFetcher>) -> Self {
        Self::Guest(GuestSession { api_fetcher })
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Self::User(session) => session.user_id,
            Self::Guest(_) => GUEST_USER_ID,
        }
    }

    pub fn api_fetcher(&self) -> &Arc<ApiFetcher> {
        match self {
            Self::User(session) => &session.api_fetcher,
            Self::Guest(session) => &session.api_fetcher,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }

    /// Whether this is the authenticated session of `user_id`.
    pub(crate) fn belongs_to(&self, user_id: UserId) -> bool {
        !self.is_guest() && self.user_id() == user_id
    }
}
