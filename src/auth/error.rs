use thiserror::Error;

use crate::error::EuriaError;

/// Errors from the login service and the token store.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Access denied")]
    AccessDenied,
    #[error("Invalid or expired grant: {0}")]
    InvalidGrant(String),
    #[error("Rate limited")]
    RateLimited { retry_after_ms: Option<u64> },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidConfiguration(error.to_string())
    }
}

impl From<AuthError> for EuriaError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::RateLimited { retry_after_ms } => EuriaError::RateLimited { retry_after_ms },
            AuthError::InvalidConfiguration(msg) => EuriaError::Configuration(msg),
            other => EuriaError::Authentication(other.to_string()),
        }
    }
}
