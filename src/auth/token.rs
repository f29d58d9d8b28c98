use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Account identifier assigned by the backend.
pub type UserId = i64;

/// OAuth token pair issued by the login service.
///
/// # Example
/// ```no_run
/// use euria::auth::ApiToken;
///
/// let token = ApiToken::bearer("access")
///     .with_refresh_token("refresh")
///     .expiring_in(chrono::Duration::hours(2));
/// assert!(!token.is_expired());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    /// Owner of the token; stamped once the profile has been fetched.
    pub user_id: Option<UserId>,
}

impl ApiToken {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            expires_at: None,
            scope: None,
            user_id: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn expiring_in(mut self, lifetime: Duration) -> Self {
        self.expires_at = Some(Utc::now() + lifetime);
        self
    }

    /// Tokens without an expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}
