//! OAuth connect/callback routes for both source platforms.
//!
//! The round-trip state (plus the PKCE verifier for Etsy and the store id
//! for both) rides in a short-lived HttpOnly cookie; the callback validates
//! it, exchanges the code, encrypts the tokens, and creates the migration
//! row in `connected` status.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;

use storeforge_core::{MigrationConfig, Platform, TokenCipher};
use storeforge_db::NewMigration;
use storeforge_etsy::{EtsyOAuthClient, PkcePair};
use storeforge_shopify::{oauth::random_state, ShopifyOAuthClient};

use crate::middleware::RequestId;

use super::{ApiError, AppState};

const SHOPIFY_STATE_COOKIE: &str = "sf_shopify_state";
const ETSY_STATE_COOKIE: &str = "sf_etsy_state";
const STATE_COOKIE_MAX_AGE_SECS: u32 = 600;

// ---------------------------------------------------------------------------
// Shopify
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct ShopifyConnectQuery {
    pub store_id: i64,
    /// Shop domain, e.g. `acme.myshopify.com`.
    pub shop: String,
}

pub(super) async fn shopify_connect(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ShopifyConnectQuery>,
) -> Result<Response, ApiError> {
    let (client_id, client_secret) = state
        .config
        .shopify_credentials()
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;
    let oauth = ShopifyOAuthClient::new(client_id, client_secret, state.config.http_timeout_secs)
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;

    let oauth_state = random_state();
    let redirect_uri = format!("{}/api/migration/shopify/callback", state.config.app_url);
    let authorize = oauth.authorize_url(&query.shop, &redirect_uri, &oauth_state);

    // state : store_id, read back at callback time.
    let cookie = state_cookie(
        SHOPIFY_STATE_COOKIE,
        &format!("{oauth_state}:{}", query.store_id),
    );

    Ok(redirect_with_cookie(&authorize, &cookie))
}

#[derive(Debug, Deserialize)]
pub(super) struct ShopifyCallbackQuery {
    pub code: String,
    pub shop: String,
    pub state: String,
}

pub(super) async fn shopify_callback(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<ShopifyCallbackQuery>,
    axum::extract::RawQuery(raw_query): axum::extract::RawQuery,
) -> Result<Response, ApiError> {
    let (expected_state, store_id) = read_state_cookie(&headers, SHOPIFY_STATE_COOKIE)
        .ok_or_else(|| {
            ApiError::new(req_id.0.clone(), "oauth_state_mismatch", "state cookie missing")
        })?;
    if query.state != expected_state {
        return Err(ApiError::new(
            req_id.0.clone(),
            "oauth_state_mismatch",
            "state parameter does not match cookie",
        ));
    }

    let (client_id, client_secret) = state
        .config
        .shopify_credentials()
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;
    let oauth = ShopifyOAuthClient::new(client_id, client_secret, state.config.http_timeout_secs)
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;

    // The HMAC covers every decoded query parameter except `hmac` itself.
    let params: Vec<(String, String)> = raw_query
        .as_deref()
        .map(url_decoded_pairs)
        .unwrap_or_default();
    oauth.validate_callback_hmac(&params).map_err(|_| {
        ApiError::new(
            req_id.0.clone(),
            "invalid_signature",
            "callback HMAC validation failed",
        )
    })?;

    let tokens = oauth
        .exchange_code(&query.shop, &query.code)
        .await
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;

    let cipher = TokenCipher::from_base64_key(&state.config.token_key)
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;
    let access_ciphertext = cipher
        .encrypt(&tokens.access_token)
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;

    let row = storeforge_db::create_migration(
        &state.pool,
        &NewMigration {
            store_id,
            platform: Platform::Shopify,
            source_shop_id: query.shop.clone(),
            source_shop_name: Some(query.shop.clone()),
            access_token_ciphertext: access_ciphertext,
            refresh_token_ciphertext: None,
            // Offline Shopify tokens do not expire.
            token_expires_at: None,
            config: MigrationConfig::default(),
        },
    )
    .await
    .map_err(|e| super::map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(
        migration_id = row.id,
        store_id,
        shop = %query.shop,
        "shopify migration connected"
    );

    let target = format!(
        "{}/dashboard/migration?connected=shopify&migration_id={}",
        state.config.app_url, row.id
    );
    Ok(redirect_with_cookie(
        &target,
        &expired_cookie(SHOPIFY_STATE_COOKIE),
    ))
}

// ---------------------------------------------------------------------------
// Etsy
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct EtsyConnectQuery {
    pub store_id: i64,
}

pub(super) async fn etsy_connect(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<EtsyConnectQuery>,
) -> Result<Response, ApiError> {
    let client_id = state
        .config
        .etsy_client_id()
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;
    let oauth = EtsyOAuthClient::new(client_id, state.config.http_timeout_secs)
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;

    let oauth_state = random_state();
    let pkce = PkcePair::generate();
    let redirect_uri = format!("{}/api/migration/etsy/callback", state.config.app_url);
    let authorize = oauth.authorize_url(&redirect_uri, &oauth_state, &pkce);

    // state : verifier : store_id — the verifier must survive to the
    // callback to complete PKCE.
    let cookie = state_cookie(
        ETSY_STATE_COOKIE,
        &format!("{oauth_state}:{}:{}", pkce.verifier, query.store_id),
    );

    Ok(redirect_with_cookie(&authorize, &cookie))
}

#[derive(Debug, Deserialize)]
pub(super) struct EtsyCallbackQuery {
    pub code: String,
    pub state: String,
}

pub(super) async fn etsy_callback(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<EtsyCallbackQuery>,
) -> Result<Response, ApiError> {
    let raw = read_cookie(&headers, ETSY_STATE_COOKIE).ok_or_else(|| {
        ApiError::new(req_id.0.clone(), "oauth_state_mismatch", "state cookie missing")
    })?;
    let mut parts = raw.splitn(3, ':');
    let (expected_state, verifier, store_id) = match (parts.next(), parts.next(), parts.next()) {
        (Some(s), Some(v), Some(id)) => (s.to_string(), v.to_string(), id.to_string()),
        _ => {
            return Err(ApiError::new(
                req_id.0.clone(),
                "oauth_state_mismatch",
                "state cookie malformed",
            ))
        }
    };
    if query.state != expected_state {
        return Err(ApiError::new(
            req_id.0.clone(),
            "oauth_state_mismatch",
            "state parameter does not match cookie",
        ));
    }
    let store_id: i64 = store_id.parse().map_err(|_| {
        ApiError::new(req_id.0.clone(), "oauth_state_mismatch", "state cookie malformed")
    })?;

    let client_id = state
        .config
        .etsy_client_id()
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;
    let oauth = EtsyOAuthClient::new(client_id, state.config.http_timeout_secs)
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;

    let redirect_uri = format!("{}/api/migration/etsy/callback", state.config.app_url);
    let tokens = oauth
        .exchange_code(&redirect_uri, &query.code, &verifier)
        .await
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;

    // Etsy access tokens are `{user_id}.{secret}`; the prefix identifies the
    // connected shop owner.
    let shop_user_id = tokens
        .access_token
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string();

    let cipher = TokenCipher::from_base64_key(&state.config.token_key)
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;
    let access_ciphertext = cipher
        .encrypt(&tokens.access_token)
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;
    let refresh_ciphertext = cipher
        .encrypt(&tokens.refresh_token)
        .map_err(|e| ApiError::new(req_id.0.clone(), "internal_error", e.to_string()))?;

    let expires_at = chrono::Utc::now() + chrono::Duration::seconds(tokens.expires_in);
    let row = storeforge_db::create_migration(
        &state.pool,
        &NewMigration {
            store_id,
            platform: Platform::Etsy,
            source_shop_id: shop_user_id,
            source_shop_name: None,
            access_token_ciphertext: access_ciphertext,
            refresh_token_ciphertext: Some(refresh_ciphertext),
            token_expires_at: Some(expires_at),
            config: MigrationConfig::default(),
        },
    )
    .await
    .map_err(|e| super::map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(migration_id = row.id, store_id, "etsy migration connected");

    let target = format!(
        "{}/dashboard/migration?connected=etsy&migration_id={}",
        state.config.app_url, row.id
    );
    Ok(redirect_with_cookie(
        &target,
        &expired_cookie(ETSY_STATE_COOKIE),
    ))
}

// ---------------------------------------------------------------------------
// Cookie helpers
// ---------------------------------------------------------------------------

fn state_cookie(name: &str, value: &str) -> String {
    format!(
        "{name}={value}; Max-Age={STATE_COOKIE_MAX_AGE_SECS}; Path=/; HttpOnly; SameSite=Lax"
    )
}

fn expired_cookie(name: &str) -> String {
    format!("{name}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(header::COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Reads a `state:store_id` cookie, returning both parts.
fn read_state_cookie(headers: &HeaderMap, name: &str) -> Option<(String, i64)> {
    let raw = read_cookie(headers, name)?;
    let (state, store_id) = raw.split_once(':')?;
    Some((state.to_string(), store_id.parse().ok()?))
}

/// Decodes a raw query string into decoded key/value pairs, preserving
/// order — the shape the HMAC validation expects.
fn url_decoded_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(value))
        })
        .collect()
}

fn percent_decode(input: &str) -> String {
    let plus_decoded = input.replace('+', " ");
    percent_encoding::percent_decode_str(&plus_decoded)
        .decode_utf8()
        .map(|s| s.to_string())
        .unwrap_or_else(|_| plus_decoded.clone())
}

fn redirect_with_cookie(location: &str, cookie: &str) -> Response {
    (
        StatusCode::TEMPORARY_REDIRECT,
        [
            (header::LOCATION, location.to_string()),
            (header::SET_COOKIE, cookie.to_string()),
        ],
    )
        .into_response()
}
