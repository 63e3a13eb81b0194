//! Etsy Open API v3 wire types.
//!
//! Etsy returns snake_case JSON, money as `{amount, divisor, currency_code}`
//! (amount 1250 with divisor 100 is 12.50), and paginates by numeric
//! offset/limit with a `count` of all matching records.

use serde::Deserialize;

/// Envelope for every paginated Etsy list endpoint.
#[derive(Debug, Deserialize)]
pub struct EtsyPage<T> {
    /// Total records matching the query, independent of paging.
    pub count: i64,
    pub results: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct EtsyMoney {
    pub amount: i64,
    pub divisor: i64,
    #[serde(default)]
    pub currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EtsyListing {
    pub listing_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `active`, `draft`, `inactive`, `sold_out`, or `expired`.
    pub state: String,
    #[serde(default)]
    pub quantity: i32,
    pub price: EtsyMoney,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub taxonomy_path: Vec<String>,
    #[serde(default)]
    pub skus: Vec<String>,
    #[serde(default)]
    pub item_weight: Option<f64>,
    /// `oz`, `lb`, `g`, or `kg`.
    #[serde(default)]
    pub item_weight_unit: Option<String>,
    #[serde(default)]
    pub shop_section_id: Option<i64>,
    #[serde(default)]
    pub images: Vec<EtsyListingImage>,
    /// Option dimensions; Etsy has no true variant objects, so variants are
    /// synthesized from these downstream.
    #[serde(default)]
    pub property_values: Vec<EtsyPropertyValue>,
}

#[derive(Debug, Deserialize)]
pub struct EtsyListingImage {
    #[serde(default)]
    pub listing_image_id: Option<i64>,
    pub url_fullxfull: String,
}

#[derive(Debug, Deserialize)]
pub struct EtsyPropertyValue {
    #[serde(default)]
    pub property_name: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EtsyShopSection {
    pub shop_section_id: i64,
    pub title: String,
    #[serde(default)]
    pub active_listing_count: i64,
}

/// Identifier-only listing shape used when resolving section membership.
#[derive(Debug, Deserialize)]
pub struct EtsyListingRef {
    pub listing_id: i64,
}

/// OAuth token endpoint response. Etsy access tokens are short-lived and
/// ship with a refresh token.
#[derive(Debug, Deserialize)]
pub struct EtsyTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds (typically 3600).
    pub expires_in: i64,
}
