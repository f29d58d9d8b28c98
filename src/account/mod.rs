//! Accounts, sessions and the current-session pointer.
//!
//! [`AccountManager`] is the single owner of signed-in accounts. It keeps at
//! most one [`ApiFetcher`](crate::api::ApiFetcher) per user so that token
//! refreshes are shared by every caller working on behalf of that user.

pub mod error;
pub mod manager;
pub mod refresh;
pub mod session;

pub use error::AccountError;
pub use manager::AccountManager;
pub use refresh::StoreRefreshDelegate;
pub use session::{GuestSession, Session, UserSession, GUEST_USER_ID};
