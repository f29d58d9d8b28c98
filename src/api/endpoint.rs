/// A REST API route relative to the API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: String,
    query: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            path,
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Profile of the token owner.
    pub fn profile() -> Self {
        Self::new("/2/profile").with_query("with", "avatar")
    }

    /// Devices attached to the token owner.
    pub fn devices() -> Self {
        Self::new("/1/devices")
    }

    /// File upload target for an organization.
    pub fn upload_file(organization_id: i64) -> Self {
        Self::new(format!("/1/ai/{organization_id}/files"))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Absolute URL against `base_url` (query excluded, reqwest adds it).
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path)
    }
}
