use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::UploadError;
use super::import::ImportedFile;
use crate::api::{ApiFetcher, ApiResponse, Endpoint};

const FILE_FIELD: &str = "file";

/// Server-side identity of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUploadResult {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

/// Uploads imported files into an organization's AI file space.
#[derive(Debug, Clone)]
pub struct UploadApiFetcher {
    api_fetcher: Arc<ApiFetcher>,
    organization_id: i64,
}

impl UploadApiFetcher {
    pub fn new(api_fetcher: Arc<ApiFetcher>, organization_id: i64) -> Self {
        Self {
            api_fetcher,
            organization_id,
        }
    }

    /// Upload `file` as the `file` part of a multipart form.
    ///
    /// Any response without a payload is returned as [`UploadError::Api`]
    /// carrying the raw body, for the web app to interpret.
    pub async fn upload_file(&self, file: &ImportedFile) -> Result<FileUploadResult, UploadError> {
        let bytes = tokio::fs::read(&file.path).await?;
        let response = self
            .api_fetcher
            .upload_file(
                &Endpoint::upload_file(self.organization_id),
                FILE_FIELD,
                &file.name,
                &file.mime_type,
                bytes,
            )
            .await?;

        if !response.is_success() {
            tracing::debug!(status = response.status, name = %file.name, "Upload rejected");
            return Err(UploadError::Api {
                raw_json: response.body,
            });
        }
        match serde_json::from_str::<ApiResponse<FileUploadResult>>(&response.body) {
            Ok(ApiResponse {
                data: Some(result), ..
            }) => Ok(result),
            _ => Err(UploadError::Api {
                raw_json: response.body,
            }),
        }
    }
}
