use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use super::endpoint::Endpoint;
use super::http::{shared_client, status_to_error, user_agent};
use super::refresh::RefreshTokenDelegate;
use super::response::ApiResponse;
use crate::auth::{ApiToken, LoginService};
use crate::error::{EuriaError, Result};

/// Undecoded HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the API envelope and return its payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        if !self.is_success() {
            return Err(status_to_error(self.status, &self.body));
        }
        let envelope: ApiResponse<T> = serde_json::from_str(&self.body)?;
        envelope.into_data(self.status)
    }
}

#[derive(Debug, Clone)]
enum RequestBody {
    Empty,
    Json(serde_json::Value),
    File {
        field: String,
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

/// Performs API calls, optionally on behalf of a user.
///
/// An authenticated fetcher attaches its bearer token to every request. When
/// the API answers 401 and the token carries a refresh token, the fetcher
/// refreshes once through the [`LoginService`], swaps its token, informs the
/// [`RefreshTokenDelegate`] and replays the request.
///
/// Fetchers are shared behind `Arc`; one per user is kept by the
/// [`AccountManager`](crate::account::AccountManager).
pub struct ApiFetcher {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<ApiToken>>,
    login: Option<Arc<dyn LoginService>>,
    delegate: Option<Arc<dyn RefreshTokenDelegate>>,
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for ApiFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiFetcher")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl ApiFetcher {
    pub fn new(
        base_url: impl Into<String>,
        token: ApiToken,
        login: Arc<dyn LoginService>,
        delegate: Arc<dyn RefreshTokenDelegate>,
    ) -> Self {
        Self {
            client: shared_client().clone(),
            base_url: base_url.into(),
            token: RwLock::new(Some(token)),
            login: Some(login),
            delegate: Some(delegate),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Fetcher without credentials, used by guest sessions.
    pub fn anonymous(base_url: impl Into<String>) -> Self {
        Self {
            client: shared_client().clone(),
            base_url: base_url.into(),
            token: RwLock::new(None),
            login: None,
            delegate: None,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.login.is_some()
    }

    /// Current token (after any refresh).
    pub async fn token(&self) -> Option<ApiToken> {
        self.token.read().await.clone()
    }

    /// Record the owner on the held token so refresh notifications carry it.
    pub(crate) async fn stamp_owner(&self, user_id: crate::auth::UserId) {
        if let Some(token) = self.token.write().await.as_mut() {
            token.user_id = Some(user_id);
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T> {
        self.execute(Method::GET, endpoint, RequestBody::Empty)
            .await?
            .decode()
    }

    pub async fn post<B, T>(&self, endpoint: &Endpoint, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::Json(serde_json::to_value(body)?);
        self.execute(Method::POST, endpoint, body).await?.decode()
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T> {
        self.execute(Method::DELETE, endpoint, RequestBody::Empty)
            .await?
            .decode()
    }

    /// Upload one file as a multipart form and return the raw response.
    ///
    /// The body is returned undecoded so callers can forward API error JSON.
    pub async fn upload_file(
        &self,
        endpoint: &Endpoint,
        field: &str,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RawResponse> {
        let body = RequestBody::File {
            field: field.to_string(),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        };
        self.execute(Method::POST, endpoint, body).await
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: RequestBody,
    ) -> Result<RawResponse> {
        let used = self.token().await;
        let response = self.send_once(method.clone(), endpoint, &body, used.as_ref()).await?;
        if response.status != 401 || !self.can_refresh(used.as_ref()) {
            return Ok(response);
        }

        tracing::debug!(path = endpoint.path(), "API returned 401, refreshing token");
        let refreshed = self.refresh(used.as_ref()).await?;
        self.send_once(method, endpoint, &body, Some(&refreshed)).await
    }

    fn can_refresh(&self, used: Option<&ApiToken>) -> bool {
        self.login.is_some() && used.is_some_and(|t| t.refresh_token.is_some())
    }

    async fn send_once(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: &RequestBody,
        token: Option<&ApiToken>,
    ) -> Result<RawResponse> {
        let mut request = self
            .client
            .request(method, endpoint.url(&self.base_url))
            .query(endpoint.query())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, user_agent());
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, token.authorization_header());
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::File {
                field,
                file_name,
                mime_type,
                bytes,
            } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime_type)?;
                request.multipart(Form::new().part(field.clone(), part))
            }
        };

        let resp = request.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(RawResponse { status, body })
    }

    /// Refresh the token that was rejected.
    ///
    /// Concurrent callers serialize on `refresh_lock`; a caller that finds the
    /// token already replaced reuses the new one instead of refreshing twice.
    async fn refresh(&self, stale: Option<&ApiToken>) -> Result<ApiToken> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.token().await;
        let (Some(current), Some(stale)) = (current, stale) else {
            return Err(EuriaError::Authentication("no token to refresh".to_string()));
        };
        if current.access_token != stale.access_token {
            return Ok(current);
        }

        let Some(login) = self.login.as_ref() else {
            return Err(EuriaError::Authentication(
                "fetcher cannot refresh tokens".to_string(),
            ));
        };

        match login.refresh_token(&current).await {
            Ok(new_token) => {
                *self.token.write().await = Some(new_token.clone());
                if let Some(delegate) = &self.delegate {
                    delegate.did_update_token(&new_token, &current);
                }
                Ok(new_token)
            }
            Err(err) => {
                tracing::warn!(error = %err, user_id = ?current.user_id, "Token refresh failed");
                if let Some(delegate) = &self.delegate {
                    delegate.did_fail_refresh_token(&current);
                }
                Err(EuriaError::Authentication(format!("token refresh failed: {err}")))
            }
        }
    }
}
