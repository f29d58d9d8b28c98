//! Authenticated access to the REST API.

pub mod endpoint;
pub mod fetcher;
pub mod http;
pub mod refresh;
pub mod response;

pub use endpoint::Endpoint;
pub use fetcher::{ApiFetcher, RawResponse};
pub use refresh::RefreshTokenDelegate;
pub use response::ApiResponse;
