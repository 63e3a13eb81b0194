pub mod client;
pub mod error;
pub mod oauth;
pub mod transform;
pub mod types;

pub use client::{EtsyClient, PAGE_LIMIT};
pub use error::EtsyError;
pub use oauth::{EtsyOAuthClient, PkcePair, OAUTH_SCOPES};
pub use types::EtsyTokenResponse;
