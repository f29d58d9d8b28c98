//! Remote user profile and its in-memory cache.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::api::{ApiFetcher, Endpoint};
use crate::auth::UserId;
use crate::error::Result;

/// Profile of the token owner, as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

/// Caches the last fetched profile of each user.
#[derive(Debug, Default)]
pub struct UserProfileStore {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
}

impl UserProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the profile of the fetcher's token owner and cache it.
    pub async fn update_user_profile(&self, fetcher: &ApiFetcher) -> Result<UserProfile> {
        let profile: UserProfile = fetcher.get(&Endpoint::profile()).await?;
        tracing::debug!(user_id = profile.id, "Fetched user profile");
        self.profiles
            .write()
            .await
            .insert(profile.id, profile.clone());
        Ok(profile)
    }

    pub async fn profile(&self, user_id: UserId) -> Option<UserProfile> {
        self.profiles.read().await.get(&user_id).cloned()
    }

    pub async fn remove(&self, user_id: UserId) -> Option<UserProfile> {
        self.profiles.write().await.remove(&user_id)
    }
}
