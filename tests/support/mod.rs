#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use euria::account::AccountManager;
use euria::api::ApiFetcher;
use euria::auth::{ApiToken, AuthError, LinkedAccount, LoginService, TokenStore, UserId};
use euria::device::{Device, DeviceError, DeviceManager};
use euria::error::EuriaError;
use euria::upload::WebViewBridge;
use serde_json::{json, Value};
use tokio::sync::Notify;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<BTreeMap<UserId, ApiToken>>,
    devices: Mutex<HashMap<UserId, String>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, user_id: UserId, token: ApiToken) {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .insert(user_id, token);
    }

    pub fn token(&self, user_id: UserId) -> Option<ApiToken> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .get(&user_id)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().expect("store lock poisoned").is_empty()
    }

    pub fn device_for(&self, user_id: UserId) -> Option<String> {
        self.devices
            .lock()
            .expect("store lock poisoned")
            .get(&user_id)
            .cloned()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn put(
        &self,
        user_id: UserId,
        token: &ApiToken,
        device_id: Option<&str>,
    ) -> Result<(), AuthError> {
        if let Some(device_id) = device_id {
            self.devices
                .lock()
                .expect("store lock poisoned")
                .insert(user_id, device_id.to_string());
        }
        self.seed(user_id, token.clone());
        Ok(())
    }

    fn get(&self, user_id: UserId) -> Result<Option<ApiToken>, AuthError> {
        Ok(self.token(user_id))
    }

    fn remove(&self, user_id: UserId) -> Result<Option<ApiToken>, AuthError> {
        Ok(self
            .tokens
            .lock()
            .expect("store lock poisoned")
            .remove(&user_id))
    }

    fn all_tokens(&self) -> Result<BTreeMap<UserId, ApiToken>, AuthError> {
        Ok(self.tokens.lock().expect("store lock poisoned").clone())
    }
}

/// Login collaborator answering from canned tokens.
#[derive(Default)]
pub struct MockLoginService {
    exchanged: Option<ApiToken>,
    derived: HashMap<UserId, ApiToken>,
    refreshed: Option<ApiToken>,
    fail_revoke: bool,
    revoked: Mutex<Vec<String>>,
    revoked_notify: Notify,
}

impl MockLoginService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exchanged(mut self, token: ApiToken) -> Self {
        self.exchanged = Some(token);
        self
    }

    pub fn with_derived(mut self, user_id: UserId, token: ApiToken) -> Self {
        self.derived.insert(user_id, token);
        self
    }

    pub fn with_refreshed(mut self, token: ApiToken) -> Self {
        self.refreshed = Some(token);
        self
    }

    /// Record revocations but answer them with an error.
    pub fn with_failing_revoke(mut self) -> Self {
        self.fail_revoke = true;
        self
    }

    /// Tokens whose revocation was requested, failed or not.
    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().expect("login lock poisoned").clone()
    }

    /// Wait until `access_token` has been revoked.
    pub async fn wait_for_revocation(&self, access_token: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.revoked_notify.notified();
                if self.revoked().iter().any(|t| t == access_token) {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("token was not revoked");
    }
}

#[async_trait]
impl LoginService for MockLoginService {
    async fn exchange_code(&self, code: &str, _code_verifier: &str) -> Result<ApiToken, AuthError> {
        self.exchanged
            .clone()
            .ok_or_else(|| AuthError::InvalidGrant(format!("unknown code {code}")))
    }

    async fn derive_token(&self, account: &LinkedAccount) -> Result<ApiToken, AuthError> {
        self.derived
            .get(&account.user_id)
            .cloned()
            .ok_or(AuthError::AccessDenied)
    }

    async fn refresh_token(&self, _token: &ApiToken) -> Result<ApiToken, AuthError> {
        self.refreshed
            .clone()
            .ok_or_else(|| AuthError::InvalidGrant("refresh rejected".to_string()))
    }

    async fn revoke(&self, token: &ApiToken) -> Result<(), AuthError> {
        self.revoked
            .lock()
            .expect("login lock poisoned")
            .push(token.access_token.clone());
        self.revoked_notify.notify_waiters();
        if self.fail_revoke {
            return Err(AuthError::Network("revocation endpoint unreachable".to_string()));
        }
        Ok(())
    }
}

/// Device manager recording what it was asked to do.
pub struct MockDeviceManager {
    device: Option<Device>,
    fail_attach: bool,
    attempts: Mutex<Vec<UserId>>,
    attached: Mutex<Vec<UserId>>,
    forgotten: Mutex<Vec<UserId>>,
    attached_notify: Notify,
}

impl MockDeviceManager {
    pub fn new() -> Self {
        Self::with_device(Some(test_device()))
    }

    /// `None` makes device lookup fail.
    pub fn with_device(device: Option<Device>) -> Self {
        Self {
            device,
            fail_attach: false,
            attempts: Mutex::new(Vec::new()),
            attached: Mutex::new(Vec::new()),
            forgotten: Mutex::new(Vec::new()),
            attached_notify: Notify::new(),
        }
    }

    /// Every attach request fails after being recorded.
    pub fn with_failing_attach(mut self) -> Self {
        self.fail_attach = true;
        self
    }

    /// Owners of every attach request, successful or not.
    pub fn attempts(&self) -> Vec<UserId> {
        self.attempts.lock().expect("device lock poisoned").clone()
    }

    pub fn attached(&self) -> Vec<UserId> {
        self.attached.lock().expect("device lock poisoned").clone()
    }

    pub fn forgotten(&self) -> Vec<UserId> {
        self.forgotten.lock().expect("device lock poisoned").clone()
    }

    pub async fn wait_for_attach(&self, user_id: UserId) {
        self.wait_until(|| self.attached().contains(&user_id)).await;
    }

    pub async fn wait_for_attach_attempt(&self, user_id: UserId) {
        self.wait_until(|| self.attempts().contains(&user_id)).await;
    }

    async fn wait_until(&self, done: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.attached_notify.notified();
                if done() {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("device attach not observed");
    }
}

#[async_trait]
impl DeviceManager for MockDeviceManager {
    async fn get_or_create_current_device(&self) -> Result<Device, DeviceError> {
        self.device.clone().ok_or_else(|| {
            DeviceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no device",
            ))
        })
    }

    async fn attach_device_if_needed(
        &self,
        _device: &Device,
        token: &ApiToken,
        _fetcher: &ApiFetcher,
    ) -> Result<(), DeviceError> {
        let user_id = token.user_id.ok_or(DeviceError::UnknownOwner)?;
        self.attempts
            .lock()
            .expect("device lock poisoned")
            .push(user_id);
        let result = if self.fail_attach {
            Err(DeviceError::Api(EuriaError::api(503, "devices unavailable")))
        } else {
            self.attached
                .lock()
                .expect("device lock poisoned")
                .push(user_id);
            Ok(())
        };
        self.attached_notify.notify_waiters();
        result
    }

    fn forget_local_device_hash(&self, user_id: UserId) {
        self.forgotten
            .lock()
            .expect("device lock poisoned")
            .push(user_id);
    }
}

pub fn test_device() -> Device {
    Device {
        uid: "device-uid".to_string(),
        name: "test device".to_string(),
        platform: "linux".to_string(),
        model: "x86_64".to_string(),
        app_version: "0.0.0".to_string(),
    }
}

/// Bridge answering each JS function by name and recording every script.
pub struct RecordingBridge {
    scripts: Mutex<Vec<String>>,
    answers: HashMap<String, Value>,
    accepted_names: Option<Vec<String>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
            answers: HashMap::new(),
            accepted_names: None,
        }
    }

    /// Answer `prepareFilesForUpload` with the refs of the files named `names`.
    pub fn accepting_files(mut self, names: &[&str]) -> Self {
        self.accepted_names = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    fn accepted_refs(&self, script: &str) -> Option<Value> {
        let accepted = self.accepted_names.as_ref()?;
        let argument = script
            .strip_prefix("prepareFilesForUpload(")?
            .strip_suffix(')')?;
        let files: Vec<Value> = serde_json::from_str(argument).ok()?;
        let refs: Vec<Value> = files
            .into_iter()
            .filter(|file| {
                file["name"]
                    .as_str()
                    .is_some_and(|name| accepted.iter().any(|a| a == name))
            })
            .map(|file| file["ref"].clone())
            .collect();
        Some(Value::Array(refs))
    }

    /// Answer calls to `function` with `value`.
    pub fn answering(mut self, function: &str, value: Value) -> Self {
        self.answers.insert(function.to_string(), value);
        self
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().expect("bridge lock poisoned").clone()
    }

    /// Scripts calling `function`, in call order.
    pub fn calls_to(&self, function: &str) -> Vec<String> {
        let prefix = format!("{function}(");
        self.scripts()
            .into_iter()
            .filter(|script| script.starts_with(&prefix))
            .collect()
    }
}

#[async_trait]
impl WebViewBridge for RecordingBridge {
    async fn evaluate(&self, script: &str) -> Option<Value> {
        self.scripts
            .lock()
            .expect("bridge lock poisoned")
            .push(script.to_string());
        if let Some(refs) = self.accepted_refs(script) {
            return Some(refs);
        }
        let name = script.split('(').next().unwrap_or_default();
        self.answers.get(name).cloned().or(Some(Value::Null))
    }
}

pub fn profile_body(user_id: UserId) -> Value {
    json!({
        "result": "success",
        "data": {
            "id": user_id,
            "display_name": format!("User {user_id}"),
            "first_name": "Test",
            "last_name": "User",
            "email": format!("user{user_id}@example.com"),
            "avatar": null
        }
    })
}

/// Serve the profile of `user_id` to requests bearing `access_token`.
pub async fn mount_profile(server: &MockServer, access_token: &str, user_id: UserId) {
    Mock::given(method("GET"))
        .and(path("/2/profile"))
        .and(header("authorization", format!("Bearer {access_token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body(user_id)))
        .mount(server)
        .await;
}

pub struct Harness {
    pub server: MockServer,
    pub store: Arc<InMemoryTokenStore>,
    pub login: Arc<MockLoginService>,
    pub devices: Arc<MockDeviceManager>,
    pub manager: AccountManager,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(MockLoginService::new(), MockDeviceManager::new()).await
    }

    pub async fn with(login: MockLoginService, devices: MockDeviceManager) -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(InMemoryTokenStore::new());
        let login = Arc::new(login);
        let devices = Arc::new(devices);
        let manager = AccountManager::new(
            server.uri(),
            login.clone(),
            store.clone(),
            devices.clone(),
        );
        Self {
            server,
            store,
            login,
            devices,
            manager,
        }
    }
}
