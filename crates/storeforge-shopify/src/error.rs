use thiserror::Error;

/// Errors from the Shopify Admin API client and OAuth connector.
#[derive(Debug, Error)]
pub enum ShopifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by Shopify (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from Shopify: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Shopify GraphQL error: {0}")]
    Api(String),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("OAuth callback signature mismatch")]
    InvalidHmac,

    #[error("OAuth code exchange failed with status {status}: {body}")]
    OAuthExchange { status: u16, body: String },
}
