//! Etsy OAuth connector with PKCE.
//!
//! Etsy requires Proof Key for Code Exchange: a random verifier is generated
//! per authorization attempt, its SHA-256/base64url challenge rides on the
//! authorize URL, and the verifier itself is presented during the code
//! exchange. Access tokens are short-lived; the refresh flow runs proactively
//! whenever the stored expiry has passed, and callers persist the refreshed
//! tokens (re-encrypted) before use.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use reqwest::Client;
use sha2::{Digest, Sha256};

use crate::error::EtsyError;
use crate::types::EtsyTokenResponse;

const AUTHORIZE_URL: &str = "https://www.etsy.com/oauth/connect";
const DEFAULT_TOKEN_URL: &str = "https://api.etsy.com/v3/public/oauth/token";

/// Scopes requested for a migration connection.
pub const OAUTH_SCOPES: &str = "listings_r shops_r";

/// A PKCE verifier/challenge pair for one authorization attempt.
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// Random secret, kept in the state cookie until the callback.
    pub verifier: String,
    /// `base64url(sha256(verifier))`, sent on the authorize URL.
    pub challenge: String,
}

impl PkcePair {
    /// Generates a fresh verifier and derives its S256 challenge.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        Self::from_verifier(&verifier)
    }

    /// Rebuilds the pair from a stored verifier.
    #[must_use]
    pub fn from_verifier(verifier: &str) -> Self {
        let digest = Sha256::digest(verifier.as_bytes());
        Self {
            verifier: verifier.to_owned(),
            challenge: URL_SAFE_NO_PAD.encode(digest),
        }
    }
}

/// OAuth client for the Etsy app.
pub struct EtsyOAuthClient {
    client: Client,
    client_id: String,
    token_url: String,
}

impl EtsyOAuthClient {
    /// Creates an OAuth client from the app's client id (keystring).
    ///
    /// # Errors
    ///
    /// Returns [`EtsyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(client_id: &str, timeout_secs: u64) -> Result<Self, EtsyError> {
        Self::with_token_url(client_id, timeout_secs, DEFAULT_TOKEN_URL)
    }

    /// Creates an OAuth client with a custom token endpoint (for wiremock
    /// tests).
    ///
    /// # Errors
    ///
    /// Returns [`EtsyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn with_token_url(
        client_id: &str,
        timeout_secs: u64,
        token_url: &str,
    ) -> Result<Self, EtsyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("storeforge/0.1 (store-migration)")
            .build()?;

        Ok(Self {
            client,
            client_id: client_id.to_owned(),
            token_url: token_url.to_owned(),
        })
    }

    /// Builds the merchant-facing authorization URL with the PKCE challenge.
    #[must_use]
    pub fn authorize_url(&self, redirect_uri: &str, state: &str, pkce: &PkcePair) -> String {
        let mut url = reqwest::Url::parse(AUTHORIZE_URL).expect("static URL parses");
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", OAUTH_SCOPES)
            .append_pair("state", state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256");
        url.to_string()
    }

    /// Exchanges the callback `code` plus the original verifier for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`EtsyError::OAuthExchange`] on any non-2xx response (not
    /// retried — OAuth failures are not transient), [`EtsyError::Http`] on
    /// network failure, or [`EtsyError::Deserialize`] on an unexpected body.
    pub async fn exchange_code(
        &self,
        redirect_uri: &str,
        code: &str,
        verifier: &str,
    ) -> Result<EtsyTokenResponse, EtsyError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", &self.client_id),
            ("redirect_uri", redirect_uri),
            ("code", code),
            ("code_verifier", verifier),
        ])
        .await
    }

    /// Trades a refresh token for a fresh access/refresh pair.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::exchange_code`].
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<EtsyTokenResponse, EtsyError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", &self.client_id),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<EtsyTokenResponse, EtsyError> {
        let response = self.client.post(&self.token_url).form(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtsyError::OAuthExchange {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| EtsyError::Deserialize {
            context: "OAuth token response".to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_challenge_is_sha256_of_verifier() {
        // RFC 7636 appendix B test vector.
        let pair = PkcePair::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(pair.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn generated_verifiers_are_unique_and_url_safe() {
        let a = PkcePair::generate();
        let b = PkcePair::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_eq!(a.verifier.len(), 43); // 32 bytes base64url, no padding
        assert!(!a.verifier.contains('+'));
        assert!(!a.verifier.contains('/'));
        assert!(!a.verifier.contains('='));
    }

    #[test]
    fn from_verifier_round_trips_generated_challenge() {
        let pair = PkcePair::generate();
        let rebuilt = PkcePair::from_verifier(&pair.verifier);
        assert_eq!(pair.challenge, rebuilt.challenge);
    }

    #[test]
    fn authorize_url_carries_pkce_parameters() {
        let oauth = EtsyOAuthClient::new("keystring", 5).expect("client");
        let pkce = PkcePair::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        let url = oauth.authorize_url(
            "https://app.example.com/api/migration/etsy/callback",
            "state-1",
            &pkce,
        );
        assert!(url.starts_with("https://www.etsy.com/oauth/connect?"));
        assert!(url.contains("code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=state-1"));
    }
}
