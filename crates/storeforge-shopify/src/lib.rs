pub mod client;
pub mod error;
pub mod oauth;
pub mod transform;
pub mod types;

pub use client::{ShopifyAdminClient, API_VERSION, PAGE_SIZE};
pub use error::ShopifyError;
pub use oauth::{ShopifyOAuthClient, ShopifyTokenResponse, OAUTH_SCOPES};
