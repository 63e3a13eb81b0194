//! Application-level wiring for one pipeline invocation: loads the migration
//! row, decrypts credentials, refreshes expired Etsy tokens (persisting the
//! re-encrypted pair before use), builds the platform client, and dispatches
//! into [`run_migration`]. Shared by the HTTP server and the CLI.

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;

use storeforge_core::{AppConfig, ConfigError, CryptoError, Platform, TokenCipher};
use storeforge_db::{DbError, StoreMigrationRow};
use storeforge_etsy::{EtsyClient, EtsyError, EtsyOAuthClient};
use storeforge_shopify::{ShopifyAdminClient, ShopifyError};

use crate::catalog::{PgCatalog, PgImageStore};
use crate::pipeline::{run_migration, Outcome, PipelineOptions};
use crate::source::{EtsySource, ShopifySource};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Shopify(#[from] ShopifyError),

    #[error(transparent)]
    Etsy(#[from] EtsyError),

    #[error("token expired and no refresh token is stored")]
    MissingRefreshToken,
}

/// Runs one pipeline invocation for `migration_id` using app configuration
/// for credentials and timeouts.
///
/// # Errors
///
/// Returns [`RunnerError`] when the invocation could not start: unknown
/// migration, missing platform credentials, crypto failures, a failed token
/// refresh, or a lost claim ([`DbError::NotClaimable`]). Errors inside a
/// started pipeline surface as [`Outcome::Failed`] instead.
pub async fn run_for_migration(
    pool: &PgPool,
    app: &AppConfig,
    migration_id: i64,
    options: &PipelineOptions,
) -> Result<Outcome, RunnerError> {
    let row = storeforge_db::get_migration(pool, migration_id).await?;
    let platform = row.parsed_platform()?;
    let product_status = row.parsed_config()?.product_status;

    let cipher = TokenCipher::from_base64_key(&app.token_key)?;
    let access_token = cipher.decrypt(&row.access_token)?;

    let catalog = PgCatalog::new(pool.clone());
    let images = PgImageStore::new(pool.clone());

    let outcome = match platform {
        Platform::Shopify => {
            let client = ShopifyAdminClient::new(
                &row.source_shop_id,
                &access_token,
                app.http_timeout_secs,
            )?;
            let source = ShopifySource::new(client, product_status);
            run_migration(pool, &source, &catalog, &images, migration_id, options).await?
        }
        Platform::Etsy => {
            let access_token =
                refresh_etsy_token_if_expired(pool, app, &row, &cipher, access_token).await?;
            let client_id = app.etsy_client_id()?;
            let client = EtsyClient::new(client_id, &access_token, app.http_timeout_secs)?;
            let source = EtsySource::new(client, &row.source_shop_id, product_status);
            run_migration(pool, &source, &catalog, &images, migration_id, options).await?
        }
    };

    Ok(outcome)
}

/// Etsy tokens are short-lived: refresh proactively when the stored expiry
/// has passed, persisting the re-encrypted pair before use. OAuth failures
/// are not transient and propagate without retry.
async fn refresh_etsy_token_if_expired(
    pool: &PgPool,
    app: &AppConfig,
    row: &StoreMigrationRow,
    cipher: &TokenCipher,
    current_access_token: String,
) -> Result<String, RunnerError> {
    let expired = row.token_expires_at.is_some_and(|at| at <= Utc::now());
    if !expired {
        return Ok(current_access_token);
    }

    let refresh_ciphertext = row
        .refresh_token
        .as_deref()
        .ok_or(RunnerError::MissingRefreshToken)?;
    let refresh_token = cipher.decrypt(refresh_ciphertext)?;

    let oauth = EtsyOAuthClient::new(app.etsy_client_id()?, app.http_timeout_secs)?;
    let tokens = oauth.refresh_token(&refresh_token).await?;

    let access_ciphertext = cipher.encrypt(&tokens.access_token)?;
    let refresh_ciphertext = cipher.encrypt(&tokens.refresh_token)?;
    let expires_at = Utc::now() + chrono::Duration::seconds(tokens.expires_in);

    storeforge_db::update_tokens(
        pool,
        row.id,
        &access_ciphertext,
        Some(&refresh_ciphertext),
        Some(expires_at),
    )
    .await?;

    tracing::info!(migration_id = row.id, "etsy access token refreshed");
    Ok(tokens.access_token)
}
