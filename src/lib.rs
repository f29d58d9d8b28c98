//! Euria, the native core of the Euria chat client
//!
//! The chat itself runs as a web app; this crate holds what the native shell
//! needs around it: signed-in accounts and their sessions, OAuth tokens and
//! their storage, authenticated API access with token refresh, device
//! association, deep-link routing, and uploads of files shared into the app.
//!
//! # Quick Start
//!
//! ```no_run
//! use euria::prelude::*;
//!
//! # async fn example() -> euria::error::Result<()> {
//! let config = EuriaConfig::from_env()?;
//! let accounts = AccountManager::from_config(&config);
//!
//! let session = match accounts.get_first_session().await {
//!     Some(session) => session,
//!     None => accounts.create_guest_account().await,
//! };
//! accounts.set_current_session(session).await;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod device;
pub mod error;
pub mod link;
pub mod prelude;
pub mod profile;
pub mod upload;
