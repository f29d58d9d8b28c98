use crate::auth::ApiToken;

/// Observer notified when an [`ApiFetcher`](super::ApiFetcher) refreshes its token.
pub trait RefreshTokenDelegate: Send + Sync {
    fn did_update_token(&self, new_token: &ApiToken, old_token: &ApiToken);

    /// The refresh grant was rejected; the token is no longer usable.
    fn did_fail_refresh_token(&self, token: &ApiToken);
}
