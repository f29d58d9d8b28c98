use std::path::PathBuf;
use std::sync::Arc;

use super::bridge::{
    call_function, FileUploadDone, FileUploadError, FileUploadErrorJsResponse,
    FileUploadSucceedJsResponse, GetCurrentOrganizationId, PrepareFilesForUpload, WebViewBridge,
};
use super::error::UploadError;
use super::fetcher::UploadApiFetcher;
use super::import::{ImportHelper, ImportedFile};
use crate::account::Session;

/// Uploads the files of share-extension import sessions on behalf of the
/// web app.
///
/// The web app decides which files it wants (`prepareFilesForUpload`) and
/// which organization receives them; each upload outcome is reported back
/// through the bridge.
pub struct UploadManager {
    container_dir: PathBuf,
    bridge: Arc<dyn WebViewBridge>,
}

impl UploadManager {
    pub fn new(container_dir: PathBuf, bridge: Arc<dyn WebViewBridge>) -> Self {
        Self {
            container_dir,
            bridge,
        }
    }

    /// Run [`handle_import_session`](Self::handle_import_session) in the
    /// background, logging failures.
    pub fn start_import_session(self: &Arc<Self>, uuid: String, session: Arc<Session>) {
        if session.is_guest() {
            return;
        }
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = manager.handle_import_session(&uuid, &session).await {
                tracing::error!(import_uuid = %uuid, error = %e, "Import session failed");
            }
        });
    }

    /// Upload the accepted files of import session `uuid`. Guest sessions
    /// cannot upload and are ignored.
    pub async fn handle_import_session(
        &self,
        uuid: &str,
        session: &Session,
    ) -> Result<(), UploadError> {
        if session.is_guest() {
            return Ok(());
        }
        if !self.container_dir.is_dir() {
            return Err(UploadError::ContainerUnavailable);
        }

        let helper = ImportHelper::parse(&self.container_dir, uuid)
            .ok_or_else(|| UploadError::InvalidImportSession(uuid.to_string()))?;
        let files = self.prepare_upload_session(&helper).await?;
        let organization_id = self.organization_id().await?;
        let uploader = UploadApiFetcher::new(Arc::clone(session.api_fetcher()), organization_id);

        tracing::info!(import_uuid = uuid, files = files.len(), organization_id, "Uploading imported files");
        for file in &files {
            match uploader.upload_file(file).await {
                Ok(result) => {
                    let response = FileUploadSucceedJsResponse {
                        reference: file.reference.clone(),
                        id: result.id,
                        name: result.name,
                        mime_type: result.mime_type,
                    };
                    call_function(self.bridge.as_ref(), &FileUploadDone::new(&response)).await;
                }
                Err(e) => {
                    tracing::warn!(name = %file.name, error = %e, "File upload failed");
                    let error = match e {
                        UploadError::Api { raw_json } => raw_json,
                        _ => String::new(),
                    };
                    let response = FileUploadErrorJsResponse {
                        reference: file.reference.clone(),
                        error,
                    };
                    call_function(self.bridge.as_ref(), &FileUploadError::new(&response)).await;
                }
            }
        }
        Ok(())
    }

    async fn prepare_upload_session(
        &self,
        helper: &ImportHelper,
    ) -> Result<Vec<ImportedFile>, UploadError> {
        let files: Vec<ImportedFile> = helper
            .imported_file_paths()
            .into_iter()
            .map(ImportedFile::from_path)
            .collect();

        let accepted = call_function(self.bridge.as_ref(), &PrepareFilesForUpload::new(&files))
            .await
            .ok_or(UploadError::BridgeCommunicationFailed)?;

        let valid: Vec<ImportedFile> = files
            .into_iter()
            .filter(|file| accepted.contains(&file.reference))
            .collect();
        if valid.is_empty() {
            return Err(UploadError::NoValidFiles);
        }
        Ok(valid)
    }

    async fn organization_id(&self) -> Result<i64, UploadError> {
        match call_function(self.bridge.as_ref(), &GetCurrentOrganizationId).await {
            Some(id) if id > 0 => Ok(id),
            _ => Err(UploadError::InvalidOrganizationId),
        }
    }
}
