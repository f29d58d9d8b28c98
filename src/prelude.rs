//! Convenience re-exports for common use.

pub use crate::account::{AccountError, AccountManager, Session};
pub use crate::api::{ApiFetcher, Endpoint};
pub use crate::auth::{ApiToken, LoginService, TokenStore, UserId};
pub use crate::config::{ApiEnvironment, EuriaConfig};
pub use crate::error::{EuriaError, Result};
pub use crate::link::{LinkTarget, UniversalLinkHandler};
pub use crate::upload::{UploadManager, WebViewBridge};
