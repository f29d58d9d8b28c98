//! Unified error classification and recovery.

use serde::{Deserialize, Serialize};

/// Machine-readable error code reported in the API error block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotAuthorized,
    InvalidGrant,
    ObjectNotFound,
    ValidationFailed,
    TooManyRequests,
    ServerError,
    #[serde(other)]
    Unknown,
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Account,
    Configuration,
    Serialization,
    Unknown,
}

/// Structured `error` block of the API envelope.
///
/// ```json
/// { "result": "error", "error": { "code": "not_authorized", "description": "..." } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: Option<ErrorCode>,
    pub description: Option<String>,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    LoginAgain,
    CheckConnectivity,
    CheckConfiguration,
    ContactSupport,
}
