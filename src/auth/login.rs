use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use super::error::AuthError;
use super::token::{ApiToken, UserId};
use crate::config::LoginConfig;

/// An account already signed in by another app of the suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub token: ApiToken,
}

/// OAuth collaborator: code exchange, token derivation, refresh and revocation.
#[async_trait]
pub trait LoginService: Send + Sync {
    /// Exchange a PKCE authorization code for a token.
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<ApiToken, AuthError>;

    /// Derive a token for this app from a linked account's token.
    async fn derive_token(&self, account: &LinkedAccount) -> Result<ApiToken, AuthError>;

    async fn refresh_token(&self, token: &ApiToken) -> Result<ApiToken, AuthError>;

    /// Ask the server to invalidate `token`.
    async fn revoke(&self, token: &ApiToken) -> Result<(), AuthError>;
}

/// [`LoginService`] backed by the OAuth token endpoint.
///
/// # Example
/// ```no_run
/// use euria::auth::{HttpLoginService, LoginService};
/// use euria::config::EuriaConfig;
///
/// # async fn example() -> Result<(), euria::auth::AuthError> {
/// let config = EuriaConfig::default();
/// let login = HttpLoginService::new(config.login().clone());
/// let token = login.exchange_code("code", "verifier").await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpLoginService {
    client: reqwest::Client,
    config: LoginConfig,
    token_url: String,
}

impl HttpLoginService {
    pub fn new(config: LoginConfig) -> Self {
        let token_url = format!("{}token", config.login_url);
        Self {
            client: reqwest::Client::new(),
            config,
            token_url,
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<ApiToken, AuthError> {
        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(map_error_response(status, &body));
        }
        let payload: TokenResponse = serde_json::from_str(&body)?;
        Ok(payload.into_token())
    }
}

#[async_trait]
impl LoginService for HttpLoginService {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<ApiToken, AuthError> {
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    async fn derive_token(&self, account: &LinkedAccount) -> Result<ApiToken, AuthError> {
        let mut token = self
            .request_token(&[
                ("grant_type", "inter_app"),
                ("client_id", self.config.client_id.as_str()),
                ("access_token", account.token.access_token.as_str()),
            ])
            .await?;
        token.user_id = token.user_id.or(Some(account.user_id));
        Ok(token)
    }

    async fn refresh_token(&self, token: &ApiToken) -> Result<ApiToken, AuthError> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::InvalidGrant("token has no refresh token".to_string()))?;
        let mut refreshed = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("refresh_token", refresh_token),
            ])
            .await?;
        // Some servers rotate refresh tokens, others keep the old one valid.
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = token.refresh_token.clone();
        }
        refreshed.user_id = refreshed.user_id.or(token.user_id);
        Ok(refreshed)
    }

    async fn revoke(&self, token: &ApiToken) -> Result<(), AuthError> {
        let resp = self
            .client
            .delete(&self.token_url)
            .header("Accept", "application/json")
            .header("Authorization", token.authorization_header())
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(map_error_response(status, &body))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    user_id: Option<UserId>,
}

impl TokenResponse {
    fn into_token(self) -> ApiToken {
        ApiToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            scope: self.scope,
            user_id: self.user_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    error_description: Option<String>,
}

fn map_error_response(status: StatusCode, body: &str) -> AuthError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return AuthError::RateLimited {
            retry_after_ms: None,
        };
    }
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(err) => {
            let description = err.error_description.unwrap_or_else(|| err.error.clone());
            match err.error.as_str() {
                "invalid_grant" | "invalid_token" => AuthError::InvalidGrant(description),
                "access_denied" | "unauthorized_client" => AuthError::AccessDenied,
                _ => AuthError::InvalidResponse(format!(
                    "token endpoint returned {status}: {description}"
                )),
            }
        }
        Err(_) => AuthError::InvalidResponse(format!("token endpoint returned {status}")),
    }
}
