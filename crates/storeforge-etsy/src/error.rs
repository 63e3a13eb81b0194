use thiserror::Error;

/// Errors from the Etsy Open API client and OAuth connector.
#[derive(Debug, Error)]
pub enum EtsyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by Etsy (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from Etsy: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("OAuth token request failed with status {status}: {body}")]
    OAuthExchange { status: u16, body: String },
}
