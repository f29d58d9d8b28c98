use std::sync::Arc;

use crate::api::RefreshTokenDelegate;
use crate::auth::{ApiToken, TokenStore};

/// Persists tokens refreshed by API fetchers.
pub struct StoreRefreshDelegate {
    token_store: Arc<dyn TokenStore>,
}

impl StoreRefreshDelegate {
    pub fn new(token_store: Arc<dyn TokenStore>) -> Self {
        Self { token_store }
    }
}

impl RefreshTokenDelegate for StoreRefreshDelegate {
    fn did_update_token(&self, new_token: &ApiToken, old_token: &ApiToken) {
        let Some(user_id) = new_token.user_id.or(old_token.user_id) else {
            tracing::warn!("Refreshed token has no owner, not persisting it");
            return;
        };
        let mut token = new_token.clone();
        token.user_id = Some(user_id);
        match self.token_store.put(user_id, &token, None) {
            Ok(()) => tracing::debug!(user_id, "Persisted refreshed token"),
            Err(e) => tracing::warn!(user_id, error = %e, "Failed to persist refreshed token"),
        }
    }

    fn did_fail_refresh_token(&self, token: &ApiToken) {
        tracing::warn!(user_id = ?token.user_id, "Token can no longer be refreshed");
    }
}
