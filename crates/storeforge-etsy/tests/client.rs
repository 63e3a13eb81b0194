//! Integration tests for `EtsyClient` and `EtsyOAuthClient` against a
//! wiremock server. Every request must carry the `x-api-key` header in
//! addition to the bearer token — the matchers enforce that.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storeforge_etsy::{EtsyClient, EtsyError, EtsyOAuthClient};

fn test_client(server: &MockServer) -> EtsyClient {
    EtsyClient::with_base_url("keystring", "etsy-token", 5, &server.uri())
        .expect("failed to build test client")
}

fn listing_json(id: i64, state: &str) -> serde_json::Value {
    json!({
        "listing_id": id,
        "title": format!("Listing {id}"),
        "state": state,
        "quantity": 3,
        "price": { "amount": 1500, "divisor": 100 },
        "images": []
    })
}

#[tokio::test]
async fn fetch_listings_page_sends_api_key_and_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shops/shop-1/listings"))
        .and(header("x-api-key", "keystring"))
        .and(header("authorization", "Bearer etsy-token"))
        .and(query_param("state", "active"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "results": [ listing_json(9001, "active") ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let page = client.fetch_listings_page("shop-1", 0).await.expect("page");

    assert_eq!(page.count, 1);
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].listing_id, 9001);
}

#[tokio::test]
async fn fetch_listings_page_passes_offset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shops/shop-1/listings"))
        .and(query_param("offset", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 26,
            "results": [ listing_json(9002, "active") ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let page = client.fetch_listings_page("shop-1", 25).await.expect("page");
    assert_eq!(page.results[0].listing_id, 9002);
}

#[tokio::test]
async fn http_429_maps_to_rate_limited_with_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shops/shop-1/listings"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "11"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.fetch_listings_page("shop-1", 0).await.unwrap_err();

    assert!(
        matches!(err, EtsyError::RateLimited { retry_after_secs: 11 }),
        "expected RateLimited with retry_after 11, got: {err:?}"
    );
}

#[tokio::test]
async fn http_429_without_header_defaults_to_two_seconds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shops/shop-1/listings"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.fetch_listings_page("shop-1", 0).await.unwrap_err();

    assert!(
        matches!(err, EtsyError::RateLimited { retry_after_secs: 2 }),
        "expected default retry_after of 2, got: {err:?}"
    );
}

#[tokio::test]
async fn non_2xx_maps_to_unexpected_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shops/shop-1/listings"))
        .respond_with(ResponseTemplate::new(403).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.fetch_listings_page("shop-1", 0).await.unwrap_err();

    assert!(
        matches!(err, EtsyError::UnexpectedStatus { status: 403, .. }),
        "expected UnexpectedStatus(403), got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_sections_and_membership() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shops/shop-1/sections"))
        .and(header("x-api-key", "keystring"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "results": [
                { "shop_section_id": 55, "title": "Vases", "active_listing_count": 2 }
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shops/shop-1/listings"))
        .and(query_param("shop_section_ids", "55"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "results": [ { "listing_id": 9001 }, { "listing_id": 9002 } ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);

    let sections = client.fetch_sections("shop-1").await.expect("sections");
    assert_eq!(sections.results.len(), 1);
    assert_eq!(sections.results[0].title, "Vases");

    let members = client
        .fetch_section_listing_ids("shop-1", 55)
        .await
        .expect("members");
    assert_eq!(members, vec![9001, 9002]);
}

// ---------------------------------------------------------------------------
// OAuth token endpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exchange_code_posts_pkce_verifier() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code_verifier=the-verifier"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "shop.access",
            "refresh_token": "shop.refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let oauth = EtsyOAuthClient::with_token_url(
        "keystring",
        5,
        &format!("{}/oauth/token", server.uri()),
    )
    .expect("client");

    let tokens = oauth
        .exchange_code("https://app.example.com/cb", "auth-code", "the-verifier")
        .await
        .expect("exchange");

    assert_eq!(tokens.access_token, "shop.access");
    assert_eq!(tokens.refresh_token, "shop.refresh");
    assert_eq!(tokens.expires_in, 3600);
}

#[tokio::test]
async fn refresh_token_posts_refresh_grant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old.refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new.access",
            "refresh_token": "new.refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let oauth = EtsyOAuthClient::with_token_url(
        "keystring",
        5,
        &format!("{}/oauth/token", server.uri()),
    )
    .expect("client");

    let tokens = oauth.refresh_token("old.refresh").await.expect("refresh");
    assert_eq!(tokens.access_token, "new.access");
}

#[tokio::test]
async fn failed_exchange_is_a_typed_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let oauth = EtsyOAuthClient::with_token_url(
        "keystring",
        5,
        &format!("{}/oauth/token", server.uri()),
    )
    .expect("client");

    let err = oauth
        .exchange_code("https://app.example.com/cb", "bad-code", "v")
        .await
        .unwrap_err();

    assert!(
        matches!(err, EtsyError::OAuthExchange { status: 400, ref body } if body == "invalid_grant"),
        "expected OAuthExchange(400), got: {err:?}"
    );
}
