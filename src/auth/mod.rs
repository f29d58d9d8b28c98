//! OAuth tokens, token storage and the login service.

pub mod error;
pub mod login;
pub mod pkce;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use login::{HttpLoginService, LinkedAccount, LoginService};
pub use pkce::{authorize_url, PkceChallenge};
pub use store::{FileTokenStore, TokenStore, TokenStoreConfig};
pub use token::{ApiToken, UserId};
