//! Shopify OAuth connector: authorization URL construction, HMAC validation
//! of the callback, and the code-for-token exchange.
//!
//! Shopify grants offline (non-expiring) access tokens by default, so there
//! is no refresh flow. Exchange failures are not transient and are never
//! retried; the pipeline surfaces them as a migration-level auth failure.

use std::time::Duration;

use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use rand::distr::{Alphanumeric, SampleString};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::ShopifyError;

type HmacSha256 = Hmac<Sha256>;

/// Scopes requested for a migration connection: read-only access to the
/// resources the pipeline imports.
pub const OAUTH_SCOPES: &str =
    "read_products,read_product_listings,read_customers,read_orders,read_discounts";

/// Token exchange response. Offline tokens carry no expiry.
#[derive(Debug, Deserialize)]
pub struct ShopifyTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth client for the Shopify partner app.
pub struct ShopifyOAuthClient {
    client: Client,
    client_id: String,
    client_secret: String,
    /// Test hook: replaces `https://{shop}/admin/oauth/access_token`.
    token_endpoint_override: Option<String>,
}

impl ShopifyOAuthClient {
    /// Creates an OAuth client from the app credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        client_id: &str,
        client_secret: &str,
        timeout_secs: u64,
    ) -> Result<Self, ShopifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("storeforge/0.1 (store-migration)")
            .build()?;

        Ok(Self {
            client,
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
            token_endpoint_override: None,
        })
    }

    /// Points the token exchange at a custom endpoint (for wiremock tests).
    #[must_use]
    pub fn with_token_endpoint(mut self, endpoint: &str) -> Self {
        self.token_endpoint_override = Some(endpoint.to_owned());
        self
    }

    /// Builds the merchant-facing authorization URL.
    ///
    /// Offline access is Shopify's default grant, so no `grant_options` are
    /// requested.
    #[must_use]
    pub fn authorize_url(&self, shop_domain: &str, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://{shop_domain}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            encode(&self.client_id),
            encode(OAUTH_SCOPES),
            encode(redirect_uri),
            encode(state),
        )
    }

    /// Validates the HMAC-SHA256 signature Shopify appends to callback query
    /// strings.
    ///
    /// The message is every query parameter except `hmac`, sorted by key and
    /// joined as `key=value&…`; the digest is compared against the provided
    /// hex in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::InvalidHmac`] if the `hmac` parameter is
    /// absent, not valid hex, or does not match.
    pub fn validate_callback_hmac(&self, params: &[(String, String)]) -> Result<(), ShopifyError> {
        let provided_hex = params
            .iter()
            .find(|(key, _)| key == "hmac")
            .map(|(_, value)| value.as_str())
            .ok_or(ShopifyError::InvalidHmac)?;
        let provided = hex::decode(provided_hex).map_err(|_| ShopifyError::InvalidHmac)?;

        let mut rest: Vec<&(String, String)> =
            params.iter().filter(|(key, _)| key != "hmac").collect();
        rest.sort_by(|a, b| a.0.cmp(&b.0));

        let message = rest
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut mac = HmacSha256::new_from_slice(self.client_secret.as_bytes())
            .map_err(|_| ShopifyError::InvalidHmac)?;
        mac.update(message.as_bytes());
        let computed = mac.finalize().into_bytes();

        if computed.ct_eq(provided.as_slice()).into() {
            Ok(())
        } else {
            Err(ShopifyError::InvalidHmac)
        }
    }

    /// Exchanges the callback `code` for a permanent offline access token.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::OAuthExchange`] on any non-2xx response (not
    /// retried — OAuth failures are not transient), [`ShopifyError::Http`] on
    /// network failure, or [`ShopifyError::Deserialize`] on an unexpected
    /// body.
    pub async fn exchange_code(
        &self,
        shop_domain: &str,
        code: &str,
    ) -> Result<ShopifyTokenResponse, ShopifyError> {
        let endpoint = self.token_endpoint_override.clone().unwrap_or_else(|| {
            format!("https://{shop_domain}/admin/oauth/access_token")
        });

        let response = self
            .client
            .post(&endpoint)
            .json(&json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "code": code,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShopifyError::OAuthExchange {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ShopifyError::Deserialize {
            context: "access token exchange".to_string(),
            source: e,
        })
    }
}

/// Generates a random URL-safe state value for the OAuth round trip.
#[must_use]
pub fn random_state() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 32)
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}
