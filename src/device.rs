//! Device identity and its association with user tokens.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::api::{ApiFetcher, Endpoint};
use crate::auth::{ApiToken, UserId};
use crate::error::EuriaError;

const DEVICE_FILE: &str = "device.json";
const ATTACHED_FILE: &str = "attached-devices.json";

/// Device association failures. Never fatal to the caller's main operation.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Device attach request failed: {0}")]
    Api(#[from] EuriaError),
    #[error("Token has no owner; cannot attach device")]
    UnknownOwner,
}

/// This installation, as reported to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub uid: String,
    pub name: String,
    pub platform: String,
    pub model: String,
    pub app_version: String,
}

impl Device {
    fn describe_current(uid: String) -> Self {
        Self {
            uid,
            name: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            platform: std::env::consts::OS.to_string(),
            model: std::env::consts::ARCH.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Fingerprint of the device as attached for `user_id`.
    pub fn attachment_hash(&self, user_id: UserId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.uid.as_bytes());
        hasher.update(self.name.as_bytes());
        hasher.update(self.platform.as_bytes());
        hasher.update(self.model.as_bytes());
        hasher.update(self.app_version.as_bytes());
        hasher.update(user_id.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Associates this device with user tokens.
#[async_trait]
pub trait DeviceManager: Send + Sync {
    async fn get_or_create_current_device(&self) -> Result<Device, DeviceError>;

    /// Register `device` for the token owner unless it already is.
    async fn attach_device_if_needed(
        &self,
        device: &Device,
        token: &ApiToken,
        fetcher: &ApiFetcher,
    ) -> Result<(), DeviceError>;

    /// Drop what is remembered locally about `user_id`'s attachment.
    fn forget_local_device_hash(&self, user_id: UserId);
}

/// [`DeviceManager`] persisting its state as JSON files in a directory.
#[derive(Debug)]
pub struct LocalDeviceManager {
    dir: PathBuf,
    device: tokio::sync::Mutex<Option<Device>>,
    attached: Mutex<HashMap<UserId, String>>,
}

impl LocalDeviceManager {
    pub fn new(dir: PathBuf) -> Self {
        let attached = read_json::<HashMap<UserId, String>>(&dir.join(ATTACHED_FILE))
            .ok()
            .flatten()
            .unwrap_or_default();
        Self {
            dir,
            device: tokio::sync::Mutex::new(None),
            attached: Mutex::new(attached),
        }
    }

    /// Hash recorded for `user_id`, if the device was attached.
    pub fn attached_hash(&self, user_id: UserId) -> Option<String> {
        self.attached_map().get(&user_id).cloned()
    }

    /// The map is always left consistent, so a poisoned lock is recovered.
    fn attached_map(&self) -> MutexGuard<'_, HashMap<UserId, String>> {
        self.attached.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Attached device lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn save_attached(&self, map: &HashMap<UserId, String>) -> Result<(), DeviceError> {
        write_json(&self.dir.join(ATTACHED_FILE), map)
    }
}

#[async_trait]
impl DeviceManager for LocalDeviceManager {
    async fn get_or_create_current_device(&self) -> Result<Device, DeviceError> {
        let mut cached = self.device.lock().await;
        if let Some(device) = cached.as_ref() {
            return Ok(device.clone());
        }

        let path = self.dir.join(DEVICE_FILE);
        let device = match read_json::<Device>(&path)? {
            Some(device) => device,
            None => {
                let device = Device::describe_current(Uuid::new_v4().to_string());
                write_json(&path, &device)?;
                tracing::info!(uid = %device.uid, "Created device identity");
                device
            }
        };
        *cached = Some(device.clone());
        Ok(device)
    }

    async fn attach_device_if_needed(
        &self,
        device: &Device,
        token: &ApiToken,
        fetcher: &ApiFetcher,
    ) -> Result<(), DeviceError> {
        let user_id = token.user_id.ok_or(DeviceError::UnknownOwner)?;
        let hash = device.attachment_hash(user_id);
        if self.attached_hash(user_id).as_deref() == Some(hash.as_str()) {
            tracing::debug!(user_id, "Device already attached");
            return Ok(());
        }

        let _: serde_json::Value = fetcher.post(&Endpoint::devices(), device).await?;

        let snapshot = {
            let mut map = self.attached_map();
            map.insert(user_id, hash);
            map.clone()
        };
        self.save_attached(&snapshot)?;
        tracing::debug!(user_id, "Device attached");
        Ok(())
    }

    fn forget_local_device_hash(&self, user_id: UserId) {
        let snapshot = {
            let mut map = self.attached_map();
            if map.remove(&user_id).is_none() {
                return;
            }
            map.clone()
        };
        if let Err(e) = self.save_attached(&snapshot) {
            tracing::warn!(user_id, error = %e, "Failed to persist forgotten device hash");
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, DeviceError> {
    let raw = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DeviceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn poison(manager: &LocalDeviceManager) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = manager.attached.lock().unwrap();
            panic!("poisoning attached map");
        }));
        assert!(result.is_err());
        assert!(manager.attached.is_poisoned());
    }

    #[tokio::test]
    async fn device_identity_is_stable_across_instances() {
        let dir = TempDir::new().unwrap();
        let first = LocalDeviceManager::new(dir.path().to_path_buf())
            .get_or_create_current_device()
            .await
            .unwrap();
        let second = LocalDeviceManager::new(dir.path().to_path_buf())
            .get_or_create_current_device()
            .await
            .unwrap();
        assert_eq!(first.uid, second.uid);
    }

    #[test]
    fn attachment_hash_depends_on_user() {
        let device = Device::describe_current("uid".to_string());
        assert_ne!(device.attachment_hash(1), device.attachment_hash(2));
        assert_eq!(device.attachment_hash(1), device.attachment_hash(1));
        assert_eq!(device.attachment_hash(1).len(), 64);
    }

    #[tokio::test]
    async fn attach_requires_token_owner() {
        let dir = TempDir::new().unwrap();
        let manager = LocalDeviceManager::new(dir.path().to_path_buf());
        let device = manager.get_or_create_current_device().await.unwrap();
        let fetcher = ApiFetcher::anonymous("http://127.0.0.1:9");
        let err = manager
            .attach_device_if_needed(&device, &ApiToken::bearer("t"), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::UnknownOwner));
    }

    #[test]
    fn forget_removes_persisted_hash() {
        let dir = TempDir::new().unwrap();
        write_json(
            &dir.path().join(ATTACHED_FILE),
            &HashMap::from([(5_i64, "abc".to_string())]),
        )
        .unwrap();

        let manager = LocalDeviceManager::new(dir.path().to_path_buf());
        assert_eq!(manager.attached_hash(5).as_deref(), Some("abc"));
        manager.forget_local_device_hash(5);
        assert!(manager.attached_hash(5).is_none());

        let reloaded = LocalDeviceManager::new(dir.path().to_path_buf());
        assert!(reloaded.attached_hash(5).is_none());
    }

    #[tokio::test]
    async fn attach_posts_once_and_records_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/devices"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"result": "success", "data": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let manager = LocalDeviceManager::new(dir.path().to_path_buf());
        let device = manager.get_or_create_current_device().await.unwrap();
        let fetcher = ApiFetcher::anonymous(server.uri());
        let token = ApiToken::bearer("t").with_user_id(3);

        manager
            .attach_device_if_needed(&device, &token, &fetcher)
            .await
            .unwrap();
        manager
            .attach_device_if_needed(&device, &token, &fetcher)
            .await
            .unwrap();

        assert_eq!(manager.attached_hash(3), Some(device.attachment_hash(3)));
    }

    #[tokio::test]
    async fn poisoned_lock_still_records_attachment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/devices"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"result": "success", "data": true})),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let manager = LocalDeviceManager::new(dir.path().to_path_buf());
        let device = manager.get_or_create_current_device().await.unwrap();
        poison(&manager);

        manager
            .attach_device_if_needed(
                &device,
                &ApiToken::bearer("t").with_user_id(4),
                &ApiFetcher::anonymous(server.uri()),
            )
            .await
            .unwrap();

        assert_eq!(manager.attached_hash(4), Some(device.attachment_hash(4)));
        let reloaded = LocalDeviceManager::new(dir.path().to_path_buf());
        assert_eq!(reloaded.attached_hash(4), Some(device.attachment_hash(4)));
    }

    #[test]
    fn poisoned_lock_still_forgets() {
        let dir = TempDir::new().unwrap();
        write_json(
            &dir.path().join(ATTACHED_FILE),
            &HashMap::from([(6_i64, "abc".to_string())]),
        )
        .unwrap();
        let manager = LocalDeviceManager::new(dir.path().to_path_buf());
        poison(&manager);

        manager.forget_local_device_hash(6);
        assert!(manager.attached_hash(6).is_none());
    }
}
