//! Calls into the web app's JavaScript functions.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::import::ImportedFile;

/// Evaluates scripts in the web content.
#[async_trait]
pub trait WebViewBridge: Send + Sync {
    /// Run `script` and return its JSON result, or `None` if evaluation
    /// failed or produced nothing.
    async fn evaluate(&self, script: &str) -> Option<serde_json::Value>;
}

/// A JavaScript function call with a typed result.
pub trait JsFunction {
    type Output: DeserializeOwned;

    /// The call expression, arguments included.
    fn declaration(&self) -> &str;
}

/// Evaluate `function` and decode its result.
pub async fn call_function<F: JsFunction>(
    bridge: &dyn WebViewBridge,
    function: &F,
) -> Option<F::Output> {
    let value = bridge.evaluate(function.declaration()).await?;
    match serde_json::from_value(value) {
        Ok(output) => Some(output),
        Err(e) => {
            tracing::warn!(declaration = function.declaration(), error = %e, "Unexpected JS result");
            None
        }
    }
}

fn call_with_json<T: Serialize + ?Sized>(name: &str, argument: &T, fallback: &str) -> String {
    match serde_json::to_string(argument) {
        Ok(json) => format!("{name}({json})"),
        Err(e) => {
            tracing::warn!(function = name, error = %e, "Could not encode JS argument");
            format!("{name}({fallback})")
        }
    }
}

/// Navigate the web app to a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoToDestination {
    declaration: String,
}

impl GoToDestination {
    pub fn new(destination: &str) -> Self {
        Self {
            declaration: call_with_json("goTo", destination, "\"\""),
        }
    }
}

impl JsFunction for GoToDestination {
    type Output = ();

    fn declaration(&self) -> &str {
        &self.declaration
    }
}

/// Offer files to the web app; it answers with the refs it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareFilesForUpload {
    declaration: String,
}

impl PrepareFilesForUpload {
    pub fn new(files: &[ImportedFile]) -> Self {
        Self {
            declaration: call_with_json("prepareFilesForUpload", files, "[]"),
        }
    }
}

impl JsFunction for PrepareFilesForUpload {
    type Output = Vec<String>;

    fn declaration(&self) -> &str {
        &self.declaration
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetCurrentOrganizationId;

impl JsFunction for GetCurrentOrganizationId {
    type Output = i64;

    fn declaration(&self) -> &str {
        "getCurrentOrganizationId()"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadSucceedJsResponse {
    #[serde(rename = "ref")]
    pub reference: String,
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileUploadErrorJsResponse {
    #[serde(rename = "ref")]
    pub reference: String,
    pub error: String,
}

/// Tell the web app a file was uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadDone {
    declaration: String,
}

impl FileUploadDone {
    pub fn new(response: &FileUploadSucceedJsResponse) -> Self {
        Self {
            declaration: call_with_json("fileUploadDone", response, "{}"),
        }
    }
}

impl JsFunction for FileUploadDone {
    type Output = ();

    fn declaration(&self) -> &str {
        &self.declaration
    }
}

/// Tell the web app a file failed to upload. `error` is the API's raw JSON
/// error body, or empty when there was none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadError {
    declaration: String,
}

impl FileUploadError {
    pub fn new(response: &FileUploadErrorJsResponse) -> Self {
        Self {
            declaration: call_with_json("fileUploadError", response, "{}"),
        }
    }
}

impl JsFunction for FileUploadError {
    type Output = ();

    fn declaration(&self) -> &str {
        &self.declaration
    }
}
