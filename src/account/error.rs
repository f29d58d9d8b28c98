use thiserror::Error;

use crate::auth::{AuthError, UserId};
use crate::error::EuriaError;

/// Failures of account creation and lookup.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Authorization code exchange failed: {0}")]
    AuthExchange(#[source] AuthError),

    #[error("Could not fetch user profile: {0}")]
    ProfileFetch(#[source] EuriaError),

    #[error("Could not persist token: {0}")]
    TokenStore(#[source] AuthError),

    #[error("No session available for user {0}")]
    SessionUnavailable(UserId),

    #[error("No linked account could be signed in")]
    NoLinkedAccountSession,
}

impl From<AccountError> for EuriaError {
    fn from(error: AccountError) -> Self {
        match error {
            AccountError::AuthExchange(auth) => auth.into(),
            AccountError::ProfileFetch(inner) => inner,
            other => EuriaError::Account(other.to_string()),
        }
    }
}
