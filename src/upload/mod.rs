//! Share-extension imports and their upload through the web app.

pub mod bridge;
pub mod error;
pub mod fetcher;
pub mod import;
pub mod manager;

pub use bridge::{
    call_function, FileUploadDone, FileUploadError, FileUploadErrorJsResponse,
    FileUploadSucceedJsResponse, GetCurrentOrganizationId, GoToDestination, JsFunction,
    PrepareFilesForUpload, WebViewBridge,
};
pub use error::UploadError;
pub use fetcher::{FileUploadResult, UploadApiFetcher};
pub use import::{ImportHelper, ImportedFile};
pub use manager::UploadManager;
