use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{watch, Mutex};

use super::error::AccountError;
use super::refresh::StoreRefreshDelegate;
use super::session::Session;
use crate::api::{ApiFetcher, RefreshTokenDelegate};
use crate::auth::{
    ApiToken, FileTokenStore, HttpLoginService, LinkedAccount, LoginService, TokenStore,
    TokenStoreConfig, UserId,
};
use crate::config::EuriaConfig;
use crate::device::{Device, DeviceManager, LocalDeviceManager};
use crate::profile::UserProfileStore;

#[derive(Default)]
struct AccountState {
    sessions: HashMap<UserId, Arc<Session>>,
    api_fetchers: HashMap<UserId, Arc<ApiFetcher>>,
}

/// Owns every signed-in account of the process and the current session.
///
/// All public methods are `&self`. Session and fetcher maps live behind one
/// async mutex that is never held across network calls, so mutations are
/// totally ordered while logins and profile fetches run concurrently.
/// Changes of the current session are published on a [`watch`] channel.
///
/// # Example
/// ```no_run
/// use euria::account::AccountManager;
/// use euria::config::EuriaConfig;
///
/// # async fn example() -> euria::error::Result<()> {
/// let manager = AccountManager::from_config(&EuriaConfig::from_env()?);
/// if let Some(session) = manager.get_first_session().await {
///     manager.set_current_session(session).await;
/// }
/// # Ok(())
/// # }
/// ```
pub struct AccountManager {
    api_base_url: String,
    login: Arc<dyn LoginService>,
    token_store: Arc<dyn TokenStore>,
    device_manager: Arc<dyn DeviceManager>,
    refresh_delegate: Arc<dyn RefreshTokenDelegate>,
    profiles: UserProfileStore,
    state: Mutex<AccountState>,
    current_tx: watch::Sender<Option<Arc<Session>>>,
}

impl AccountManager {
    pub fn new(
        api_base_url: impl Into<String>,
        login: Arc<dyn LoginService>,
        token_store: Arc<dyn TokenStore>,
        device_manager: Arc<dyn DeviceManager>,
    ) -> Self {
        let refresh_delegate: Arc<dyn RefreshTokenDelegate> =
            Arc::new(StoreRefreshDelegate::new(Arc::clone(&token_store)));
        let (current_tx, _) = watch::channel(None);
        Self {
            api_base_url: api_base_url.into(),
            login,
            token_store,
            device_manager,
            refresh_delegate,
            profiles: UserProfileStore::new(),
            state: Mutex::new(AccountState::default()),
            current_tx,
        }
    }

    /// Production wiring: HTTP login, file token store and local device state.
    pub fn from_config(config: &EuriaConfig) -> Self {
        Self::new(
            config.api_base_url(),
            Arc::new(HttpLoginService::new(config.login().clone())),
            Arc::new(FileTokenStore::new(TokenStoreConfig::new(config.token_dir()))),
            Arc::new(LocalDeviceManager::new(config.data_dir().clone())),
        )
    }

    pub fn profiles(&self) -> &UserProfileStore {
        &self.profiles
    }

    /// Exchange an authorization code, create the account and make it current.
    pub async fn create_and_set_current_account(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<Arc<Session>, AccountError> {
        let token = self
            .login
            .exchange_code(code, code_verifier)
            .await
            .map_err(AccountError::AuthExchange)?;
        let session = self.create_account(token).await?;
        self.set_current_session(Arc::clone(&session)).await;
        Ok(session)
    }

    /// Register an account for `token`.
    ///
    /// The profile is fetched first to learn the owner; on failure nothing is
    /// stored. Device attachment runs in the background.
    pub async fn create_account(&self, token: ApiToken) -> Result<Arc<Session>, AccountError> {
        let access_token = token.access_token.clone();
        let fetcher = Arc::new(self.new_fetcher(token));
        let profile = self
            .profiles
            .update_user_profile(&fetcher)
            .await
            .map_err(AccountError::ProfileFetch)?;
        let user_id = profile.id;

        fetcher.stamp_owner(user_id).await;
        let token = fetcher
            .token()
            .await
            .ok_or(AccountError::SessionUnavailable(user_id))?;

        let device = match self.device_manager.get_or_create_current_device().await {
            Ok(device) => Some(device),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "No device identity, storing token without it");
                None
            }
        };
        self.token_store
            .put(user_id, &token, device.as_ref().map(|d| d.uid.as_str()))
            .map_err(AccountError::TokenStore)?;

        let session = self.register_session(user_id, &access_token, fetcher).await;
        if let Some(device) = device {
            self.spawn_attach_device(device, token, Arc::clone(session.api_fetcher()));
        }

        tracing::info!(user_id, "Account created");
        Ok(session)
    }

    /// Start an unauthenticated session and make it current. Guest sessions
    /// are not cached.
    pub async fn create_guest_account(&self) -> Arc<Session> {
        let fetcher = Arc::new(ApiFetcher::anonymous(self.api_base_url.as_str()));
        let session = Arc::new(Session::guest(fetcher));
        self.set_current_session(Arc::clone(&session)).await;
        tracing::info!("Guest session started");
        session
    }

    /// Sign in every linked account and make the first one current.
    ///
    /// Tokens are derived concurrently; accounts are then created in order.
    /// Accounts whose token cannot be derived or whose creation fails are
    /// skipped.
    pub async fn login_with_linked_accounts(
        &self,
        accounts: &[LinkedAccount],
    ) -> Result<Arc<Session>, AccountError> {
        let derived = join_all(
            accounts
                .iter()
                .map(|account| self.login.derive_token(account)),
        )
        .await;

        let mut first = None;
        for (account, token) in accounts.iter().zip(derived) {
            let token = match token {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!(user_id = account.user_id, error = %e, "Could not derive token for linked account");
                    continue;
                }
            };
            match self.create_account(token).await {
                Ok(session) => {
                    if first.is_none() {
                        first = Some(session);
                    }
                }
                Err(e) => {
                    tracing::warn!(user_id = account.user_id, error = %e, "Could not create linked account");
                }
            }
        }

        let session = first.ok_or(AccountError::NoLinkedAccountSession)?;
        self.set_current_session(Arc::clone(&session)).await;
        Ok(session)
    }

    /// Replace the token of an existing account.
    ///
    /// The fetcher and session of that user are rebuilt; if the user is
    /// current, the current session is swapped for the new one.
    pub async fn update_account(&self, token: ApiToken) -> Result<Arc<Session>, AccountError> {
        let user_id = match token.user_id {
            Some(user_id) => user_id,
            None => {
                let fetcher = self.new_fetcher(token.clone());
                self.profiles
                    .update_user_profile(&fetcher)
                    .await
                    .map_err(AccountError::ProfileFetch)?
                    .id
            }
        };
        let mut token = token;
        token.user_id = Some(user_id);
        self.token_store
            .put(user_id, &token, None)
            .map_err(AccountError::TokenStore)?;

        let fetcher = Arc::new(self.new_fetcher(token));
        let session = Arc::new(Session::user(user_id, Arc::clone(&fetcher)));

        let mut state = self.state.lock().await;
        state.api_fetchers.insert(user_id, fetcher);
        self.install_session(&mut state, user_id, Arc::clone(&session));
        drop(state);

        tracing::info!(user_id, "Account token updated");
        Ok(session)
    }

    /// Make `session` current and notify watchers.
    ///
    /// An authenticated session that is not cached yet is registered so the
    /// current session always has a cache entry.
    pub async fn set_current_session(&self, session: Arc<Session>) {
        let mut state = self.state.lock().await;
        if let Session::User(user) = session.as_ref() {
            state
                .api_fetchers
                .entry(user.user_id)
                .or_insert_with(|| Arc::clone(&user.api_fetcher));
            state
                .sessions
                .entry(user.user_id)
                .or_insert_with(|| Arc::clone(&session));
        }
        tracing::debug!(user_id = session.user_id(), guest = session.is_guest(), "Current session set");
        self.current_tx.send_replace(Some(session));
    }

    pub fn current_session(&self) -> Option<Arc<Session>> {
        self.current_tx.borrow().clone()
    }

    /// Subscribe to current session changes.
    pub fn watch_current_session(&self) -> watch::Receiver<Option<Arc<Session>>> {
        self.current_tx.subscribe()
    }

    /// Cached session for `user_id`, or one built from the persisted token.
    ///
    /// Returns `None` for users without a stored token.
    pub async fn get_user_session(&self, user_id: UserId) -> Option<Arc<Session>> {
        if let Some(session) = self.state.lock().await.sessions.get(&user_id) {
            tracing::debug!(user_id, "Session cache hit");
            return Some(Arc::clone(session));
        }

        // Read outside the lock; another task may cache the session meanwhile.
        let token = match self.token_store.get(user_id) {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Could not read stored token");
                return None;
            }
        };

        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.get(&user_id) {
            return Some(Arc::clone(session));
        }
        let fetcher = self.cached_fetcher(&mut state, user_id, token);
        let session = Arc::new(Session::user(user_id, fetcher));
        state.sessions.insert(user_id, Arc::clone(&session));
        tracing::debug!(user_id, "Session restored from token store");
        Some(session)
    }

    /// The fetcher of `user_id`, created from `token` on first use.
    pub async fn get_api_fetcher(&self, user_id: UserId, token: ApiToken) -> Arc<ApiFetcher> {
        let mut state = self.state.lock().await;
        self.cached_fetcher(&mut state, user_id, token)
    }

    /// Log `user_id` out: forget the token, the session and local device
    /// state, then revoke the token in the background.
    ///
    /// Every cached fetcher is dropped, not only this user's.
    pub async fn remove_token_and_account_for(&self, user_id: UserId) {
        let stored = match self.token_store.remove(user_id) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Could not remove stored token");
                None
            }
        };

        let evicted = {
            let mut state = self.state.lock().await;
            let evicted = state.sessions.remove(&user_id);
            state.api_fetchers.clear();
            self.current_tx.send_if_modified(|current| {
                let is_current = current.as_ref().is_some_and(|c| c.belongs_to(user_id));
                if is_current {
                    *current = None;
                }
                is_current
            });
            evicted
        };

        self.profiles.remove(user_id).await;
        self.device_manager.forget_local_device_hash(user_id);

        // The live fetcher may hold a refreshed token newer than the stored one.
        let live = match &evicted {
            Some(session) => session.api_fetcher().token().await,
            None => None,
        };
        if let Some(token) = live.or(stored) {
            self.spawn_revoke(user_id, token);
        }

        tracing::info!(user_id, "Account removed");
    }

    /// Session of the stored account with the lowest user id.
    pub async fn get_first_session(&self) -> Option<Arc<Session>> {
        let user_id = match self.token_store.all_tokens() {
            Ok(tokens) => *tokens.keys().next()?,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list stored tokens");
                return None;
            }
        };
        self.get_user_session(user_id).await
    }

    /// Ids of the accounts with a cached session, ascending.
    pub async fn get_account_ids(&self) -> Vec<UserId> {
        let state = self.state.lock().await;
        let mut ids: Vec<UserId> = state.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn new_fetcher(&self, token: ApiToken) -> ApiFetcher {
        ApiFetcher::new(
            self.api_base_url.as_str(),
            token,
            Arc::clone(&self.login),
            Arc::clone(&self.refresh_delegate),
        )
    }

    fn cached_fetcher(
        &self,
        state: &mut AccountState,
        user_id: UserId,
        mut token: ApiToken,
    ) -> Arc<ApiFetcher> {
        let fetcher = state.api_fetchers.entry(user_id).or_insert_with(|| {
            tracing::debug!(user_id, "Creating API fetcher");
            token.user_id = Some(user_id);
            Arc::new(self.new_fetcher(token))
        });
        Arc::clone(fetcher)
    }

    /// Cache the fetcher and session built during account creation.
    ///
    /// A cached fetcher holding the same access token wins, so concurrent
    /// creations of one account converge on a single session. A new session
    /// also replaces the current one when it belongs to the same user.
    async fn register_session(
        &self,
        user_id: UserId,
        access_token: &str,
        fetcher: Arc<ApiFetcher>,
    ) -> Arc<Session> {
        let mut state = self.state.lock().await;

        let reusable = match state.api_fetchers.get(&user_id) {
            Some(existing) => existing
                .token()
                .await
                .is_some_and(|t| t.access_token == access_token)
                .then(|| Arc::clone(existing)),
            None => None,
        };
        let fetcher = match reusable {
            Some(existing) => existing,
            None => {
                state.api_fetchers.insert(user_id, Arc::clone(&fetcher));
                fetcher
            }
        };

        if let Some(session) = state.sessions.get(&user_id) {
            if Arc::ptr_eq(session.api_fetcher(), &fetcher) {
                return Arc::clone(session);
            }
        }
        let session = Arc::new(Session::user(user_id, fetcher));
        self.install_session(&mut state, user_id, Arc::clone(&session));
        session
    }

    /// Cache `session` for `user_id` and swap it in if that user is current.
    fn install_session(&self, state: &mut AccountState, user_id: UserId, session: Arc<Session>) {
        state.sessions.insert(user_id, Arc::clone(&session));
        self.current_tx.send_if_modified(|current| {
            let is_current = current.as_ref().is_some_and(|c| c.belongs_to(user_id));
            if is_current {
                *current = Some(session);
            }
            is_current
        });
    }

    fn spawn_attach_device(&self, device: Device, token: ApiToken, fetcher: Arc<ApiFetcher>) {
        let device_manager = Arc::clone(&self.device_manager);
        tokio::spawn(async move {
            if let Err(e) = device_manager
                .attach_device_if_needed(&device, &token, &fetcher)
                .await
            {
                tracing::error!(user_id = ?token.user_id, error = %e, "Failed to attach device");
            }
        });
    }

    fn spawn_revoke(&self, user_id: UserId, token: ApiToken) {
        let login = Arc::clone(&self.login);
        tokio::spawn(async move {
            match login.revoke(&token).await {
                Ok(()) => tracing::debug!(user_id, "Token revoked"),
                Err(e) => tracing::error!(user_id, error = %e, "Failed to revoke token"),
            }
        });
    }
}
