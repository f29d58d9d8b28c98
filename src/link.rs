//! Routing of deep links and universal links to web destinations.

use url::Url;
use uuid::Uuid;

use crate::config::EuriaConfig;

/// Custom scheme of the app's own deep links.
pub const DEEPLINK_SCHEME: &str = "euria";

const NEW_CHAT_HOST: &str = "widget-new-chat";
const EPHEMERAL_HOST: &str = "widget-ephemeral";
const SPEECH_HOST: &str = "widget-speech";
const IMPORT_HOST: &str = "shareextension-import";
const SESSION_UUID_PARAM: &str = "session_uuid";

pub const EPHEMERAL_ROUTE: &str = "/?ephemeral=true";
pub const SPEECH_ROUTE: &str = "/?speech=true";

/// Deep links emitted by the widget and the share extension.
pub struct DeeplinkConstants;

impl DeeplinkConstants {
    pub const NEW_CHAT_URL: &'static str = "euria://widget-new-chat";
    pub const EPHEMERAL_URL: &'static str = "euria://widget-ephemeral";
    pub const SPEECH_URL: &'static str = "euria://widget-speech";

    /// Link opening the app on the import session `uuid`.
    pub fn import_url_for(uuid: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(uuid.as_bytes()).collect();
        format!("{DEEPLINK_SCHEME}://{IMPORT_HOST}?{SESSION_UUID_PARAM}={encoded}")
    }
}

/// Where the shell should go for an incoming link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Load this URL in the web view.
    Web(Url),
    /// Upload the files of a share-extension import session.
    Import { session_uuid: String },
}

/// Maps incoming links onto the Euria web app.
#[derive(Debug, Clone)]
pub struct UniversalLinkHandler {
    euria_host: String,
}

impl UniversalLinkHandler {
    pub fn new(euria_host: impl Into<String>) -> Self {
        Self {
            euria_host: euria_host.into(),
        }
    }

    pub fn from_config(config: &EuriaConfig) -> Self {
        Self::new(config.euria_host())
    }

    /// Resolve `url`, or `None` if it is not a link the app handles.
    ///
    /// Links already on the Euria host are kept as is. Other web links are
    /// treated as kSuite links: `/all/.../euria/<rest>` becomes `<rest>` and
    /// otherwise the `/euria` segment is dropped, both re-rooted on the
    /// Euria host without query or fragment.
    pub fn handle_possible_universal_link(&self, url: &Url) -> Option<LinkTarget> {
        if url.scheme() == DEEPLINK_SCHEME {
            return self.deeplink(url);
        }
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if url.host_str() == Some(self.euria_host.as_str()) {
            return Some(LinkTarget::Web(url.clone()));
        }
        self.ksuite_link(url)
    }

    fn deeplink(&self, url: &Url) -> Option<LinkTarget> {
        match url.host_str()? {
            NEW_CHAT_HOST => self.web(""),
            EPHEMERAL_HOST => self.web(EPHEMERAL_ROUTE),
            SPEECH_HOST => self.web(SPEECH_ROUTE),
            IMPORT_HOST => {
                let session_uuid = url
                    .query_pairs()
                    .find(|(key, _)| key == SESSION_UUID_PARAM)
                    .map(|(_, value)| value.into_owned());
                match session_uuid {
                    Some(session_uuid) if Uuid::parse_str(&session_uuid).is_ok() => {
                        Some(LinkTarget::Import { session_uuid })
                    }
                    _ => {
                        tracing::warn!("Import link without a valid session id");
                        None
                    }
                }
            }
            other => {
                tracing::debug!(host = other, "Unknown deep link");
                None
            }
        }
    }

    fn ksuite_link(&self, url: &Url) -> Option<LinkTarget> {
        let path = url.path();
        let remaining = match path.find("euria") {
            Some(index) if path.starts_with("/all") => path[index + "euria".len()..].to_string(),
            _ => path.replace("/euria", ""),
        };
        self.web(&remaining)
    }

    fn web(&self, path: &str) -> Option<LinkTarget> {
        Url::parse(&format!("https://{}{}", self.euria_host, path))
            .ok()
            .map(LinkTarget::Web)
    }
}
