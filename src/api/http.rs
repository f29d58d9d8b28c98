//! Shared HTTP client and status mapping.

use std::sync::OnceLock;

use reqwest::header::HeaderValue;

use super::response::ApiResponse;
use crate::error::EuriaError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// `User-Agent` sent with every API request.
pub fn user_agent() -> HeaderValue {
    let value = format!(
        "{}/{} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("euria"))
}

/// Map a non-success HTTP status (and its body) to an error.
pub fn status_to_error(status: u16, body: &str) -> EuriaError {
    let details = serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.error);
    let message = details
        .as_ref()
        .and_then(|d| d.description.clone())
        .unwrap_or_else(|| body.to_string());
    match status {
        401 | 403 => EuriaError::Authentication(message),
        429 => EuriaError::RateLimited {
            retry_after_ms: None,
        },
        _ => match details {
            Some(details) => EuriaError::api_with_details(status, message, details),
            None => EuriaError::api(status, message),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn unauthorized_maps_to_authentication() {
        let err = status_to_error(
            401,
            r#"{"result":"error","error":{"code":"not_authorized","description":"token revoked"}}"#,
        );
        match err {
            EuriaError::Authentication(msg) => assert_eq!(msg, "token revoked"),
            other => panic!("expected Authentication, got {other:?}"),
        }
    }

    #[test]
    fn envelope_error_details_are_kept() {
        let err = status_to_error(
            404,
            r#"{"result":"error","error":{"code":"object_not_found","description":"no such file"}}"#,
        );
        match err {
            EuriaError::Api {
                status, details, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(details.unwrap().code, Some(ErrorCode::ObjectNotFound));
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn plain_body_becomes_message() {
        let err = status_to_error(500, "boom");
        assert_eq!(err.to_string(), "API error (status 500): boom");
    }

    #[test]
    fn user_agent_names_the_crate() {
        let ua = user_agent();
        assert!(ua.to_str().unwrap().starts_with("euria/"));
    }
}
