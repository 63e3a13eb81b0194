//! The store-side entity-creation capability the pipeline writes through,
//! plus the Postgres-backed adapter.
//!
//! The trait mirrors the platform's internal creation surface; tests swap in
//! in-memory fakes, production uses [`PgCatalog`].

use sqlx::PgPool;
use thiserror::Error;

use storeforge_core::{MigrationCoupon, MigrationCustomer, MigrationOrder, MigrationProduct};
use storeforge_db::DbError;

use crate::images::{ImageStore, ImageUploadError};

/// Failure creating an internal entity. Carries the message only — the
/// pipeline logs it against the record and moves on.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CatalogError(pub String);

impl From<DbError> for CatalogError {
    fn from(err: DbError) -> Self {
        CatalogError(err.to_string())
    }
}

/// Internal entity creation: each call returns the generated internal id.
pub trait StoreCatalog {
    fn create_product(
        &self,
        store_id: i64,
        product: &MigrationProduct,
    ) -> impl std::future::Future<Output = Result<i64, CatalogError>> + Send;

    fn create_collection(
        &self,
        store_id: i64,
        name: &str,
        description: Option<&str>,
        product_ids: &[i64],
    ) -> impl std::future::Future<Output = Result<i64, CatalogError>> + Send;

    fn create_customer(
        &self,
        store_id: i64,
        customer: &MigrationCustomer,
    ) -> impl std::future::Future<Output = Result<i64, CatalogError>> + Send;

    fn create_coupon(
        &self,
        store_id: i64,
        coupon: &MigrationCoupon,
    ) -> impl std::future::Future<Output = Result<i64, CatalogError>> + Send;

    fn create_order(
        &self,
        store_id: i64,
        order: &MigrationOrder,
        customer_id: Option<i64>,
        item_product_ids: &[Option<i64>],
    ) -> impl std::future::Future<Output = Result<i64, CatalogError>> + Send;

    /// Removes the demo products seeded into a new store. Returns the count
    /// removed. Runs at most once per migration, gated on an empty product
    /// ID map.
    fn delete_seed_products(
        &self,
        store_id: i64,
    ) -> impl std::future::Future<Output = Result<u64, CatalogError>> + Send;
}

/// Postgres-backed catalog writer.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl StoreCatalog for PgCatalog {
    async fn create_product(
        &self,
        store_id: i64,
        product: &MigrationProduct,
    ) -> Result<i64, CatalogError> {
        Ok(storeforge_db::create_product(&self.pool, store_id, product).await?)
    }

    async fn create_collection(
        &self,
        store_id: i64,
        name: &str,
        description: Option<&str>,
        product_ids: &[i64],
    ) -> Result<i64, CatalogError> {
        Ok(
            storeforge_db::create_collection(&self.pool, store_id, name, description, product_ids)
                .await?,
        )
    }

    async fn create_customer(
        &self,
        store_id: i64,
        customer: &MigrationCustomer,
    ) -> Result<i64, CatalogError> {
        Ok(storeforge_db::create_customer(&self.pool, store_id, customer).await?)
    }

    async fn create_coupon(
        &self,
        store_id: i64,
        coupon: &MigrationCoupon,
    ) -> Result<i64, CatalogError> {
        Ok(storeforge_db::create_coupon(&self.pool, store_id, coupon).await?)
    }

    async fn create_order(
        &self,
        store_id: i64,
        order: &MigrationOrder,
        customer_id: Option<i64>,
        item_product_ids: &[Option<i64>],
    ) -> Result<i64, CatalogError> {
        Ok(storeforge_db::create_order(
            &self.pool,
            store_id,
            order,
            customer_id,
            item_product_ids,
        )
        .await?)
    }

    async fn delete_seed_products(&self, store_id: i64) -> Result<u64, CatalogError> {
        Ok(storeforge_db::delete_seed_products(&self.pool, store_id).await?)
    }
}

/// Store-side image adapter: the fetch/resize/store work happens inside the
/// image-processing service; this records the re-hosted reference against
/// the product.
#[derive(Clone)]
pub struct PgImageStore {
    pool: PgPool,
}

impl PgImageStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ImageStore for PgImageStore {
    async fn upload_from_url(
        &self,
        _store_id: i64,
        product_id: i64,
        url: &str,
        position: i32,
    ) -> Result<(), ImageUploadError> {
        storeforge_db::record_product_image(&self.pool, product_id, url, position)
            .await
            .map_err(|e| ImageUploadError(e.to_string()))
    }
}
