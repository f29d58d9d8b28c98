use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::{ApiToken, UserId};

const TOKEN_FILE_VERSION: u32 = 1;
const TOKEN_FILE_PREFIX: &str = "user-";
const TOKEN_FILE_SUFFIX: &str = ".toml";

/// Storage abstraction for persisted OAuth tokens, keyed by user id.
pub trait TokenStore: Send + Sync {
    /// Store `token` for `user_id`, replacing any previous token.
    ///
    /// A `None` device id keeps the device id already recorded for the user.
    fn put(&self, user_id: UserId, token: &ApiToken, device_id: Option<&str>)
        -> Result<(), AuthError>;
    fn get(&self, user_id: UserId) -> Result<Option<ApiToken>, AuthError>;
    /// Remove and return the token for `user_id`, if any.
    fn remove(&self, user_id: UserId) -> Result<Option<ApiToken>, AuthError>;
    fn all_tokens(&self) -> Result<BTreeMap<UserId, ApiToken>, AuthError>;
}

/// Configuration for file-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

/// File-backed token store, one TOML file per user.
///
/// # Example
/// ```no_run
/// use euria::auth::{ApiToken, FileTokenStore, TokenStore, TokenStoreConfig};
///
/// let store = FileTokenStore::new(TokenStoreConfig::new("/tmp/euria-tokens".into()));
/// store.put(42, &ApiToken::bearer("access"), None)?;
/// assert!(store.get(42)?.is_some());
/// # Ok::<(), euria::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    fn token_path(&self, user_id: UserId) -> PathBuf {
        self.base_dir
            .join(format!("{TOKEN_FILE_PREFIX}{user_id}{TOKEN_FILE_SUFFIX}"))
    }

    fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn read_file(path: &Path) -> Result<Option<TokenFile>, AuthError> {
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: TokenFile = toml::from_str(&raw)?;
        if file.version != TOKEN_FILE_VERSION {
            return Err(AuthError::Serialization(format!(
                "unsupported token file version {} at {}",
                file.version,
                path.display()
            )));
        }
        Ok(Some(file))
    }
}

impl TokenStore for FileTokenStore {
    fn put(
        &self,
        user_id: UserId,
        token: &ApiToken,
        device_id: Option<&str>,
    ) -> Result<(), AuthError> {
        let path = self.token_path(user_id);
        Self::ensure_parent(&path)?;
        let device_id = match device_id {
            Some(id) => Some(id.to_string()),
            None => Self::read_file(&path).ok().flatten().and_then(|f| f.device_id),
        };
        let file = TokenFile {
            version: TOKEN_FILE_VERSION,
            user_id,
            device_id,
            saved_at: Utc::now(),
            token: token.clone(),
        };
        let serialized = toml::to_string(&file)?;
        fs::write(&path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn get(&self, user_id: UserId) -> Result<Option<ApiToken>, AuthError> {
        Ok(Self::read_file(&self.token_path(user_id))?.map(|file| file.token))
    }

    fn remove(&self, user_id: UserId) -> Result<Option<ApiToken>, AuthError> {
        let path = self.token_path(user_id);
        // An unreadable file is still deleted; only its token is lost.
        let existing = Self::read_file(&path).unwrap_or_else(|e| {
            tracing::warn!(user_id, error = %e, "Removing unreadable token file");
            None
        });
        match fs::remove_file(&path) {
            Ok(()) => Ok(existing.map(|file| file.token)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }

    fn all_tokens(&self) -> Result<BTreeMap<UserId, ApiToken>, AuthError> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };

        let mut tokens = BTreeMap::new();
        for entry in entries {
            let path = entry?.path();
            if parse_user_id(&path).is_none() {
                continue;
            }
            match Self::read_file(&path) {
                Ok(Some(file)) => {
                    tokens.insert(file.user_id, file.token);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable token file");
                }
            }
        }
        Ok(tokens)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    user_id: UserId,
    device_id: Option<String>,
    saved_at: DateTime<Utc>,
    token: ApiToken,
}

fn parse_user_id(path: &Path) -> Option<UserId> {
    path.file_name()?
        .to_str()?
        .strip_prefix(TOKEN_FILE_PREFIX)?
        .strip_suffix(TOKEN_FILE_SUFFIX)?
        .parse()
        .ok()
}
