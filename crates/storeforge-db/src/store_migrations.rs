//! Database operations for the `store_migrations` progress record.
//!
//! One row tracks one store-to-platform migration attempt: status, per-entity
//! counters, the bounded error log, the five source→internal ID maps, and the
//! pagination cursor. All mutations for a given migration run strictly
//! sequentially inside one pipeline invocation; counter writes are absolute
//! values guarded by an optimistic `version` column, so a second concurrent
//! writer surfaces as [`DbError::VersionConflict`] instead of a lost update.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use storeforge_core::{
    MigrationConfig, MigrationCounters, MigrationErrorEntry, MigrationPhase, MigrationStatus,
    Platform,
};

use crate::DbError;

/// Maximum entries retained in the `errors` log; older entries are dropped.
pub const ERROR_LOG_CAP: i64 = 100;

const COLUMNS: &str = "id, public_id, store_id, platform, source_shop_id, source_shop_name, \
     access_token, refresh_token, token_expires_at, status, config, \
     total_products, migrated_products, failed_products, \
     total_collections, migrated_collections, failed_collections, \
     total_images, migrated_images, failed_images, \
     total_customers, migrated_customers, failed_customers, \
     total_coupons, migrated_coupons, failed_coupons, \
     total_orders, migrated_orders, failed_orders, \
     errors, product_id_map, collection_id_map, customer_id_map, coupon_id_map, order_id_map, \
     last_phase, last_cursor, version, started_at, completed_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `store_migrations` table.
///
/// Rows are never deleted; a store starting over gets a fresh row and the old
/// one stays as an audit trail. Only the most recent row per store is active.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreMigrationRow {
    pub id: i64,
    pub public_id: Uuid,
    pub store_id: i64,
    pub platform: String,
    pub source_shop_id: String,
    pub source_shop_name: Option<String>,
    /// Encrypted (AES-GCM, base64) access token.
    pub access_token: String,
    /// Encrypted refresh token; only Etsy issues one.
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub status: String,
    pub config: serde_json::Value,
    pub total_products: i32,
    pub migrated_products: i32,
    pub failed_products: i32,
    pub total_collections: i32,
    pub migrated_collections: i32,
    pub failed_collections: i32,
    pub total_images: i32,
    pub migrated_images: i32,
    pub failed_images: i32,
    pub total_customers: i32,
    pub migrated_customers: i32,
    pub failed_customers: i32,
    pub total_coupons: i32,
    pub migrated_coupons: i32,
    pub failed_coupons: i32,
    pub total_orders: i32,
    pub migrated_orders: i32,
    pub failed_orders: i32,
    pub errors: serde_json::Value,
    pub product_id_map: serde_json::Value,
    pub collection_id_map: serde_json::Value,
    pub customer_id_map: serde_json::Value,
    pub coupon_id_map: serde_json::Value,
    pub order_id_map: serde_json::Value,
    pub last_phase: Option<String>,
    pub last_cursor: Option<String>,
    pub version: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoreMigrationRow {
    /// Parses the stored status text.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] if the column holds an unknown value.
    pub fn parsed_status(&self) -> Result<MigrationStatus, DbError> {
        self.status.parse().map_err(|_| DbError::InvalidValue {
            field: "status",
            value: self.status.clone(),
        })
    }

    /// Parses the stored platform text.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] if the column holds an unknown value.
    pub fn parsed_platform(&self) -> Result<Platform, DbError> {
        self.platform.parse().map_err(|_| DbError::InvalidValue {
            field: "platform",
            value: self.platform.clone(),
        })
    }

    /// Deserializes the stored migration config.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] if the JSONB does not match
    /// [`MigrationConfig`].
    pub fn parsed_config(&self) -> Result<MigrationConfig, DbError> {
        serde_json::from_value(self.config.clone()).map_err(|_| DbError::InvalidValue {
            field: "config",
            value: self.config.to_string(),
        })
    }

    /// Copies the 18 counter columns into an in-memory accumulator.
    #[must_use]
    pub fn counters(&self) -> MigrationCounters {
        MigrationCounters {
            total_products: self.total_products,
            migrated_products: self.migrated_products,
            failed_products: self.failed_products,
            total_collections: self.total_collections,
            migrated_collections: self.migrated_collections,
            failed_collections: self.failed_collections,
            total_images: self.total_images,
            migrated_images: self.migrated_images,
            failed_images: self.failed_images,
            total_customers: self.total_customers,
            migrated_customers: self.migrated_customers,
            failed_customers: self.failed_customers,
            total_coupons: self.total_coupons,
            migrated_coupons: self.migrated_coupons,
            failed_coupons: self.failed_coupons,
            total_orders: self.total_orders,
            migrated_orders: self.migrated_orders,
            failed_orders: self.failed_orders,
        }
    }

    /// The ID map for one phase as `source_id → internal id`.
    ///
    /// Entries that are not numbers are skipped rather than failing the read;
    /// the maps are only ever written through [`merge_id_map_entry`].
    #[must_use]
    pub fn id_map(&self, phase: MigrationPhase) -> HashMap<String, i64> {
        let value = match phase {
            MigrationPhase::Products => &self.product_id_map,
            MigrationPhase::Collections => &self.collection_id_map,
            MigrationPhase::Customers => &self.customer_id_map,
            MigrationPhase::Coupons => &self.coupon_id_map,
            MigrationPhase::Orders => &self.order_id_map,
        };
        id_map_from_value(value)
    }

    /// Deserializes the bounded error log.
    #[must_use]
    pub fn error_entries(&self) -> Vec<MigrationErrorEntry> {
        serde_json::from_value(self.errors.clone()).unwrap_or_default()
    }
}

fn id_map_from_value(value: &serde_json::Value) -> HashMap<String, i64> {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_i64().map(|id| (k.clone(), id)))
                .collect()
        })
        .unwrap_or_default()
}

fn id_map_column(phase: MigrationPhase) -> &'static str {
    match phase {
        MigrationPhase::Products => "product_id_map",
        MigrationPhase::Collections => "collection_id_map",
        MigrationPhase::Customers => "customer_id_map",
        MigrationPhase::Coupons => "coupon_id_map",
        MigrationPhase::Orders => "order_id_map",
    }
}

// ---------------------------------------------------------------------------
// Creation and reads
// ---------------------------------------------------------------------------

/// Input for [`create_migration`]. Tokens arrive already encrypted.
#[derive(Debug, Clone)]
pub struct NewMigration {
    pub store_id: i64,
    pub platform: Platform,
    pub source_shop_id: String,
    pub source_shop_name: Option<String>,
    pub access_token_ciphertext: String,
    pub refresh_token_ciphertext: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub config: MigrationConfig,
}

/// Creates a migration row in `connected` status after a completed OAuth
/// connection. Returns the full newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, or [`DbError::InvalidValue`]
/// if the config cannot be serialized.
pub async fn create_migration(
    pool: &PgPool,
    new: &NewMigration,
) -> Result<StoreMigrationRow, DbError> {
    let public_id = Uuid::new_v4();
    let config = serde_json::to_value(&new.config).map_err(|_| DbError::InvalidValue {
        field: "config",
        value: "unserializable MigrationConfig".to_string(),
    })?;

    let sql = format!(
        "INSERT INTO store_migrations \
             (public_id, store_id, platform, source_shop_id, source_shop_name, \
              access_token, refresh_token, token_expires_at, status, config) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'connected', $9) \
         RETURNING {COLUMNS}"
    );

    let row = sqlx::query_as::<_, StoreMigrationRow>(&sql)
        .bind(public_id)
        .bind(new.store_id)
        .bind(new.platform.as_str())
        .bind(&new.source_shop_id)
        .bind(&new.source_shop_name)
        .bind(&new.access_token_ciphertext)
        .bind(&new.refresh_token_ciphertext)
        .bind(new.token_expires_at)
        .bind(config)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Fetches a migration by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_migration(pool: &PgPool, id: i64) -> Result<StoreMigrationRow, DbError> {
    let sql = format!("SELECT {COLUMNS} FROM store_migrations WHERE id = $1");
    let row = sqlx::query_as::<_, StoreMigrationRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetches the most recent migration for a store, if any. Only the latest
/// row is active; older rows are audit history.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_migration_for_store(
    pool: &PgPool,
    store_id: i64,
) -> Result<Option<StoreMigrationRow>, DbError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM store_migrations \
         WHERE store_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, StoreMigrationRow>(&sql)
        .bind(store_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

/// Sets the migration status, stamping `started_at` on entering `running`
/// and `completed_at` on entering a terminal state.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the update fails.
pub async fn set_status(pool: &PgPool, id: i64, status: MigrationStatus) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE store_migrations SET \
             status = $2, \
             started_at = CASE WHEN $2 = 'running' THEN COALESCE(started_at, NOW()) \
                               ELSE started_at END, \
             completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN NOW() \
                                 ELSE completed_at END, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Claims the migration for one pipeline invocation: a guarded transition
/// from a resumable status into `running`.
///
/// This is the single-runner lease — a second invocation racing for the same
/// migration loses the guarded update and gets [`DbError::NotClaimable`]
/// instead of silently running concurrently.
///
/// # Errors
///
/// Returns [`DbError::NotClaimable`] if the row is not in a resumable
/// status, [`DbError::NotFound`] if it does not exist, or [`DbError::Sqlx`]
/// on query failure.
pub async fn claim_for_run(pool: &PgPool, id: i64) -> Result<StoreMigrationRow, DbError> {
    let sql = format!(
        "UPDATE store_migrations SET \
             status = 'running', \
             started_at = COALESCE(started_at, NOW()), \
             updated_at = NOW() \
         WHERE id = $1 AND status IN ('connected', 'paused', 'cancelled') \
         RETURNING {COLUMNS}"
    );

    let claimed = sqlx::query_as::<_, StoreMigrationRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match claimed {
        Some(row) => Ok(row),
        None => {
            let current = get_migration(pool, id).await?;
            Err(DbError::NotClaimable {
                id,
                status: current.status,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Progress writes
// ---------------------------------------------------------------------------

/// Flushes the in-memory counter accumulator plus the current phase/cursor in
/// one update, guarded by the expected `version`. Returns the new version.
///
/// Counter values are absolute, not deltas, so a retried flush is harmless.
///
/// # Errors
///
/// Returns [`DbError::VersionConflict`] if another writer bumped the version
/// since it was read, or [`DbError::Sqlx`] on query failure.
pub async fn flush_progress(
    pool: &PgPool,
    id: i64,
    counters: &MigrationCounters,
    last_phase: Option<MigrationPhase>,
    last_cursor: Option<&str>,
    expected_version: i32,
) -> Result<i32, DbError> {
    let new_version = sqlx::query_scalar::<_, i32>(
        "UPDATE store_migrations SET \
             total_products = $3, migrated_products = $4, failed_products = $5, \
             total_collections = $6, migrated_collections = $7, failed_collections = $8, \
             total_images = $9, migrated_images = $10, failed_images = $11, \
             total_customers = $12, migrated_customers = $13, failed_customers = $14, \
             total_coupons = $15, migrated_coupons = $16, failed_coupons = $17, \
             total_orders = $18, migrated_orders = $19, failed_orders = $20, \
             last_phase = $21, last_cursor = $22, \
             version = version + 1, updated_at = NOW() \
         WHERE id = $1 AND version = $2 \
         RETURNING version",
    )
    .bind(id)
    .bind(expected_version)
    .bind(counters.total_products)
    .bind(counters.migrated_products)
    .bind(counters.failed_products)
    .bind(counters.total_collections)
    .bind(counters.migrated_collections)
    .bind(counters.failed_collections)
    .bind(counters.total_images)
    .bind(counters.migrated_images)
    .bind(counters.failed_images)
    .bind(counters.total_customers)
    .bind(counters.migrated_customers)
    .bind(counters.failed_customers)
    .bind(counters.total_coupons)
    .bind(counters.migrated_coupons)
    .bind(counters.failed_coupons)
    .bind(counters.total_orders)
    .bind(counters.migrated_orders)
    .bind(counters.failed_orders)
    .bind(last_phase.map(MigrationPhase::as_str))
    .bind(last_cursor)
    .fetch_optional(pool)
    .await?;

    new_version.ok_or(DbError::VersionConflict {
        id,
        expected_version,
    })
}

/// Appends one entry to the error log, retaining only the trailing
/// [`ERROR_LOG_CAP`] entries (oldest dropped first).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails, or [`DbError::InvalidValue`]
/// if the entry cannot be serialized.
pub async fn append_error(
    pool: &PgPool,
    id: i64,
    entry: &MigrationErrorEntry,
) -> Result<(), DbError> {
    let entry_json = serde_json::to_value(entry).map_err(|_| DbError::InvalidValue {
        field: "errors",
        value: "unserializable MigrationErrorEntry".to_string(),
    })?;

    sqlx::query(
        "UPDATE store_migrations SET \
             errors = (\
                 SELECT COALESCE(jsonb_agg(elem ORDER BY ord), '[]'::jsonb) \
                 FROM (\
                     SELECT elem, ord \
                     FROM jsonb_array_elements(errors || jsonb_build_array($2::jsonb)) \
                          WITH ORDINALITY AS t(elem, ord) \
                     ORDER BY ord DESC \
                     LIMIT $3\
                 ) tail\
             ), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(entry_json)
    .bind(ERROR_LOG_CAP)
    .execute(pool)
    .await?;

    Ok(())
}

/// Merges one `source_id → internal_id` pair into a phase's ID map.
///
/// The merge happens inside Postgres (`||` on jsonb), so no read-modify-write
/// window exists for map entries.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn merge_id_map_entry(
    pool: &PgPool,
    id: i64,
    phase: MigrationPhase,
    source_id: &str,
    internal_id: i64,
) -> Result<(), DbError> {
    let column = id_map_column(phase);
    let sql = format!(
        "UPDATE store_migrations SET \
             {column} = {column} || jsonb_build_object($2::text, $3::bigint), \
             updated_at = NOW() \
         WHERE id = $1"
    );

    sqlx::query(&sql)
        .bind(id)
        .bind(source_id)
        .bind(internal_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Fetches one phase's ID map fresh from the store.
///
/// Used before cross-entity linking (collections → products, orders →
/// customers) so linking sees entries written by earlier invocations, not
/// just the in-memory copy.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn fetch_id_map(
    pool: &PgPool,
    id: i64,
    phase: MigrationPhase,
) -> Result<HashMap<String, i64>, DbError> {
    let column = id_map_column(phase);
    let sql = format!("SELECT {column} FROM store_migrations WHERE id = $1");

    let value = sqlx::query_scalar::<_, serde_json::Value>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(id_map_from_value(&value))
}

/// Replaces the stored migration config. Called when the merchant starts
/// (or reconfigures and restarts) a migration; the config is immutable for
/// the duration of a run.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, [`DbError::Sqlx`] if the
/// update fails, or [`DbError::InvalidValue`] if the config cannot be
/// serialized.
pub async fn set_config(
    pool: &PgPool,
    id: i64,
    config: &MigrationConfig,
) -> Result<(), DbError> {
    let value = serde_json::to_value(config).map_err(|_| DbError::InvalidValue {
        field: "config",
        value: "unserializable MigrationConfig".to_string(),
    })?;

    let result = sqlx::query(
        "UPDATE store_migrations SET config = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(value)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Persists refreshed (re-encrypted) OAuth tokens and their expiry.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the update fails.
pub async fn update_tokens(
    pool: &PgPool,
    id: i64,
    access_token_ciphertext: &str,
    refresh_token_ciphertext: Option<&str>,
    token_expires_at: Option<DateTime<Utc>>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE store_migrations SET \
             access_token = $2, \
             refresh_token = COALESCE($3, refresh_token), \
             token_expires_at = $4, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(access_token_ciphertext)
    .bind(refresh_token_ciphertext)
    .bind(token_expires_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_map_from_value_reads_numeric_entries() {
        let value = json!({"123": 7, "456": 9});
        let map = id_map_from_value(&value);
        assert_eq!(map.get("123"), Some(&7));
        assert_eq!(map.get("456"), Some(&9));
    }

    #[test]
    fn id_map_from_value_skips_non_numeric_entries() {
        let value = json!({"123": 7, "bad": "x"});
        let map = id_map_from_value(&value);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn id_map_from_value_tolerates_non_object() {
        assert!(id_map_from_value(&json!(null)).is_empty());
        assert!(id_map_from_value(&json!([1, 2])).is_empty());
    }

    #[test]
    fn id_map_column_covers_every_phase() {
        for phase in MigrationPhase::ORDER {
            assert!(id_map_column(phase).ends_with("_id_map"));
        }
    }
}
