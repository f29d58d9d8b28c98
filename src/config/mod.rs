//! Configuration system (layered: code > env > defaults).

use std::path::PathBuf;

use strum::{Display, EnumString};

use crate::error::{EuriaError, Result};

/// OAuth client registered for the app.
pub const DEFAULT_CLIENT_ID: &str = "10476B29-7B98-4D42-B06B-2B7AB0F06FDE";
/// Redirect URI the login web page sends the authorization code to.
pub const DEFAULT_REDIRECT_URI: &str = "com.infomaniak.euria://oauth2redirect";

/// Backend environment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ApiEnvironment {
    #[default]
    Prod,
    Preprod,
}

impl ApiEnvironment {
    /// Root domain every service host is derived from.
    pub fn host(&self) -> &'static str {
        match self {
            Self::Prod => "infomaniak.com",
            Self::Preprod => "preprod.dev.infomaniak.ch",
        }
    }
}

/// OAuth client settings for the login service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginConfig {
    pub client_id: String,
    pub redirect_uri: String,
    /// Base URL of the login service, with a trailing slash.
    pub login_url: String,
}

impl LoginConfig {
    pub fn for_host(host: &str) -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            login_url: format!("https://login.{host}/"),
        }
    }
}

/// Layered configuration for the client core.
///
/// Resolution order:
/// 1. Values set in code (`with_*` builders)
/// 2. Environment variables (and `.env`), see [`EuriaConfig::from_env`]
/// 3. Defaults for [`ApiEnvironment::Prod`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EuriaConfig {
    environment: ApiEnvironment,
    host: String,
    api_base_url: String,
    login: LoginConfig,
    data_dir: PathBuf,
}

impl Default for EuriaConfig {
    fn default() -> Self {
        Self::new(ApiEnvironment::default())
    }
}

impl EuriaConfig {
    /// Defaults for an environment.
    pub fn new(environment: ApiEnvironment) -> Self {
        let host = environment.host().to_string();
        Self {
            environment,
            api_base_url: format!("https://api.{host}"),
            login: LoginConfig::for_host(&host),
            host,
            data_dir: default_data_dir(),
        }
    }

    /// Load from environment variables.
    ///
    /// | Variable             | Effect                                   |
    /// |----------------------|------------------------------------------|
    /// | `EURIA_ENV`          | `prod` or `preprod`                      |
    /// | `EURIA_HOST`         | root domain override                     |
    /// | `EURIA_API_URL`      | API base URL override                    |
    /// | `EURIA_CLIENT_ID`    | OAuth client id                          |
    /// | `EURIA_REDIRECT_URI` | OAuth redirect URI                       |
    /// | `EURIA_DATA_DIR`     | token store / device / imports directory |
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let environment = match std::env::var("EURIA_ENV") {
            Ok(raw) => raw.parse::<ApiEnvironment>().map_err(|_| {
                EuriaError::Configuration(format!(
                    "unknown EURIA_ENV '{raw}' (expected prod or preprod)"
                ))
            })?,
            Err(_) => ApiEnvironment::default(),
        };

        let mut config = Self::new(environment);
        if let Ok(host) = std::env::var("EURIA_HOST") {
            config = config.with_host(host)?;
        }
        if let Ok(url) = std::env::var("EURIA_API_URL") {
            config = config.with_api_base_url(url);
        }
        if let Ok(client_id) = std::env::var("EURIA_CLIENT_ID") {
            config.login.client_id = client_id;
        }
        if let Ok(redirect_uri) = std::env::var("EURIA_REDIRECT_URI") {
            config.login.redirect_uri = redirect_uri;
        }
        if let Ok(dir) = std::env::var("EURIA_DATA_DIR") {
            config = config.with_data_dir(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Override the root domain; derived URLs follow it.
    pub fn with_host(mut self, host: impl Into<String>) -> Result<Self> {
        let host = host.into();
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() || host.contains('/') {
            return Err(EuriaError::Configuration(format!("invalid host '{host}'")));
        }
        self.host = host.to_string();
        self.api_base_url = format!("https://api.{host}");
        self.login.login_url = format!("https://login.{host}/");
        Ok(self)
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_login(mut self, login: LoginConfig) -> Self {
        self.login = login;
        self
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = dir;
        self
    }

    pub fn environment(&self) -> ApiEnvironment {
        self.environment
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Base URL of the REST API, without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn login(&self) -> &LoginConfig {
        &self.login
    }

    /// Host serving the chat web app.
    pub fn euria_host(&self) -> String {
        format!("euria.{}", self.host)
    }

    pub fn kdrive_host(&self) -> String {
        format!("kdrive.{}", self.host)
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn token_dir(&self) -> PathBuf {
        self.data_dir.join("tokens")
    }

    /// Shared container the share extension drops imports into.
    pub fn import_container_dir(&self) -> PathBuf {
        self.data_dir.join("shared")
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "infomaniak", "euria")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".euria"))
}
