//! HTTP client for the Etsy Open API v3.
//!
//! Every call carries the OAuth bearer token plus an `x-api-key` header equal
//! to the OAuth client id — Etsy rejects requests missing either. Pagination
//! is numeric offset/limit; the `count` field in each page is the true total.
//! Like the Shopify client, this is a dumb transport: 429 becomes a typed
//! rate-limit error and the pipeline owns retry policy.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::EtsyError;
use crate::types::{EtsyListing, EtsyListingRef, EtsyPage, EtsyShopSection};

const DEFAULT_BASE_URL: &str = "https://openapi.etsy.com/v3/application";

/// Listings requested per page.
pub const PAGE_LIMIT: i64 = 25;

/// Fallback delay when a 429 response omits `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Client for one connected Etsy shop.
pub struct EtsyClient {
    client: Client,
    base_url: String,
    /// The OAuth client id, sent as `x-api-key` on every request.
    api_key: String,
    access_token: String,
}

impl EtsyClient {
    /// Creates a client pointed at the production Etsy API.
    ///
    /// # Errors
    ///
    /// Returns [`EtsyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, access_token: &str, timeout_secs: u64) -> Result<Self, EtsyError> {
        Self::with_base_url(api_key, access_token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`EtsyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn with_base_url(
        api_key: &str,
        access_token: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, EtsyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("storeforge/0.1 (store-migration)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            access_token: access_token.to_owned(),
        })
    }

    /// Fetches one page of active listings with their images.
    ///
    /// # Errors
    ///
    /// - [`EtsyError::RateLimited`] — HTTP 429 with the suggested delay.
    /// - [`EtsyError::UnexpectedStatus`] — any other non-2xx status.
    /// - [`EtsyError::Deserialize`] — response shape mismatch.
    /// - [`EtsyError::Http`] — network failure.
    pub async fn fetch_listings_page(
        &self,
        shop_id: &str,
        offset: i64,
    ) -> Result<EtsyPage<EtsyListing>, EtsyError> {
        let url = format!(
            "{}/shops/{shop_id}/listings?state=active&limit={PAGE_LIMIT}&offset={offset}&includes=Images",
            self.base_url
        );
        self.get_json(&url, "listings page").await
    }

    /// Fetches all shop sections (Etsy's collection equivalent).
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_listings_page`].
    pub async fn fetch_sections(
        &self,
        shop_id: &str,
    ) -> Result<EtsyPage<EtsyShopSection>, EtsyError> {
        let url = format!("{}/shops/{shop_id}/sections", self.base_url);
        self.get_json(&url, "shop sections").await
    }

    /// Fetches the listing ids belonging to one section. This is the
    /// per-section membership call — sections do not embed their listings.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_listings_page`].
    pub async fn fetch_section_listing_ids(
        &self,
        shop_id: &str,
        section_id: i64,
    ) -> Result<Vec<i64>, EtsyError> {
        let url = format!(
            "{}/shops/{shop_id}/listings?shop_section_ids={section_id}&state=active&limit=100",
            self.base_url
        );
        let page: EtsyPage<EtsyListingRef> = self.get_json(&url, "section listings").await?;
        Ok(page.results.into_iter().map(|l| l.listing_id).collect())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        context: &str,
    ) -> Result<T, EtsyError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            tracing::warn!(retry_after_secs, "etsy returned 429");
            return Err(EtsyError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtsyError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| EtsyError::Deserialize {
            context: context.to_string(),
            source: e,
        })
    }
}
