use serde::{Deserialize, Serialize};

use crate::error::{ErrorDetails, EuriaError};

/// Envelope every API response is wrapped in.
///
/// ```json
/// { "result": "success", "data": { ... } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub result: String,
    pub data: Option<T>,
    pub error: Option<ErrorDetails>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.result == "success"
    }

    /// Unwrap the payload, turning an error envelope into [`EuriaError::Api`].
    pub fn into_data(self, status: u16) -> Result<T, EuriaError> {
        if let Some(data) = self.data {
            return Ok(data);
        }
        match self.error {
            Some(details) => {
                let message = details
                    .description
                    .clone()
                    .unwrap_or_else(|| "request failed".to_string());
                Err(EuriaError::api_with_details(status, message, details))
            }
            None => Err(EuriaError::api(status, "response carried no data")),
        }
    }
}
