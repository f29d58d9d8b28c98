use thiserror::Error;

use crate::error::EuriaError;

/// Failures of an import session upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Import container is unavailable")]
    ContainerUnavailable,

    #[error("Invalid import session id: {0}")]
    InvalidImportSession(String),

    #[error("The web app accepted none of the imported files")]
    NoValidFiles,

    #[error("The web app reported no valid organization")]
    InvalidOrganizationId,

    #[error("Could not communicate with the web app")]
    BridgeCommunicationFailed,

    #[error("Upload rejected by the API")]
    Api { raw_json: String },

    #[error("Upload request failed: {0}")]
    Request(#[from] EuriaError),

    #[error("Could not read imported file: {0}")]
    Io(#[from] std::io::Error),
}
