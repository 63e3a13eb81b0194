//! End-to-end pipeline tests: wiremock stands in for the source platforms,
//! the real Postgres-backed catalog and progress store run underneath via
//! `#[sqlx::test]`.

use std::time::Duration;

use serde_json::json;
use sqlx::PgPool;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storeforge_core::{
    MigrationConfig, MigrationErrorKind, MigrationPhase, Platform, ProductStatus,
};
use storeforge_db::NewMigration;
use storeforge_etsy::EtsyClient;
use storeforge_migrate::{
    run_migration, CatalogError, EtsySource, Outcome, PgCatalog, PgImageStore, PipelineOptions,
    ShopifySource, StoreCatalog,
};
use storeforge_shopify::ShopifyAdminClient;

const STORE_ID: i64 = 7;

fn fast_options() -> PipelineOptions {
    PipelineOptions {
        time_budget: Duration::from_secs(270),
        max_rate_limit_retries: 10,
        backoff_base_ms: 1,
        backoff_cap_ms: 4,
    }
}

fn products_only_config() -> MigrationConfig {
    MigrationConfig {
        import_products: true,
        import_collections: false,
        import_customers: false,
        import_coupons: false,
        import_orders: false,
        product_status: ProductStatus::Draft,
    }
}

async fn seed_migration(pool: &PgPool, platform: Platform, config: MigrationConfig) -> i64 {
    let row = storeforge_db::create_migration(
        pool,
        &NewMigration {
            store_id: STORE_ID,
            platform,
            source_shop_id: "shop-1".to_string(),
            source_shop_name: Some("Test Shop".to_string()),
            access_token_ciphertext: "ciphertext".to_string(),
            refresh_token_ciphertext: None,
            token_expires_at: None,
            config,
        },
    )
    .await
    .expect("seed migration");
    row.id
}

fn shopify_source(server: &MockServer) -> ShopifySource {
    let client =
        ShopifyAdminClient::with_endpoint(&format!("{}/graphql.json", server.uri()), "tok", 5)
            .expect("client");
    ShopifySource::new(client, ProductStatus::Draft)
}

fn etsy_source(server: &MockServer) -> EtsySource {
    let client = EtsyClient::with_base_url("keystring", "tok", 5, &server.uri()).expect("client");
    EtsySource::new(client, "shop-1", ProductStatus::Draft)
}

fn shopify_product_node(id: i64) -> serde_json::Value {
    json!({ "node": {
        "id": format!("gid://shopify/Product/{id}"),
        "title": format!("Product {id}"),
        "status": "ACTIVE",
        "variants": { "edges": [ { "node": {
            "id": format!("gid://shopify/ProductVariant/{id}01"),
            "title": "Default Title",
            "price": "10.00",
            "inventoryQuantity": 2,
            "selectedOptions": [ { "name": "Title", "value": "Default Title" } ]
        }}]},
        "images": { "edges": [] }
    }})
}

fn shopify_products_page(ids: &[i64], next_cursor: Option<&str>) -> serde_json::Value {
    json!({ "data": { "products": {
        "pageInfo": { "hasNextPage": next_cursor.is_some(), "endCursor": next_cursor },
        "edges": ids.iter().map(|id| shopify_product_node(*id)).collect::<Vec<_>>()
    }}})
}

async fn mount_product_count(server: &MockServer, count: i64) {
    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_string_contains("productsCount"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "productsCount": { "count": count } }
        })))
        .mount(server)
        .await;
}

async fn mount_products_first_page(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_string_contains("query Products"))
        .and(body_string_contains("\"after\":null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Happy path + idempotency
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn shopify_products_single_page_completes(pool: PgPool) {
    let server = MockServer::start().await;
    mount_product_count(&server, 2).await;
    mount_products_first_page(&server, shopify_products_page(&[1, 2], None)).await;

    let migration_id = seed_migration(&pool, Platform::Shopify, products_only_config()).await;
    let source = shopify_source(&server);
    let catalog = PgCatalog::new(pool.clone());
    let images = PgImageStore::new(pool.clone());

    let outcome = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("pipeline");

    assert!(matches!(outcome, Outcome::Completed), "got: {outcome:?}");

    let row = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");
    assert_eq!(row.status, "completed");
    assert_eq!(row.total_products, 2);
    assert_eq!(row.migrated_products, 2);
    assert_eq!(row.failed_products, 0);
    assert_eq!(row.id_map(MigrationPhase::Products).len(), 2);
    assert!(row.completed_at.is_some());

    let created: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE store_id = $1")
        .bind(STORE_ID)
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(created, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn rerun_with_full_id_map_migrates_nothing(pool: PgPool) {
    let server = MockServer::start().await;
    mount_product_count(&server, 2).await;
    mount_products_first_page(&server, shopify_products_page(&[1, 2], None)).await;

    let migration_id = seed_migration(&pool, Platform::Shopify, products_only_config()).await;
    let source = shopify_source(&server);
    let catalog = PgCatalog::new(pool.clone());
    let images = PgImageStore::new(pool.clone());

    let first = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("first run");
    assert!(matches!(first, Outcome::Completed));
    let after_first = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");

    // Completed is terminal; flip back to paused to allow a re-claim, as a
    // stuck dashboard retry would.
    sqlx::query("UPDATE store_migrations SET status = 'paused' WHERE id = $1")
        .bind(migration_id)
        .execute(&pool)
        .await
        .expect("reset status");

    let second = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("second run");
    assert!(matches!(second, Outcome::Completed));

    let after_second = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");
    assert_eq!(after_second.migrated_products, after_first.migrated_products);
    assert_eq!(after_second.failed_products, 0);
    assert_eq!(
        after_second.id_map(MigrationPhase::Products).len(),
        after_first.id_map(MigrationPhase::Products).len()
    );

    // No duplicate catalog rows were created.
    let created: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE store_id = $1")
        .bind(STORE_ID)
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(created, 2);
}

// ---------------------------------------------------------------------------
// Pause / resume
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn zero_budget_pauses_before_first_page(pool: PgPool) {
    let server = MockServer::start().await;
    mount_product_count(&server, 2).await;
    // No page mock mounted: a page fetch would 404 and fail the test.

    let migration_id = seed_migration(&pool, Platform::Shopify, products_only_config()).await;
    let source = shopify_source(&server);
    let catalog = PgCatalog::new(pool.clone());
    let images = PgImageStore::new(pool.clone());

    let options = PipelineOptions {
        time_budget: Duration::ZERO,
        ..fast_options()
    };
    let outcome = run_migration(&pool, &source, &catalog, &images, migration_id, &options)
        .await
        .expect("pipeline");

    assert!(
        matches!(
            outcome,
            Outcome::Paused {
                phase: MigrationPhase::Products,
                ..
            }
        ),
        "got: {outcome:?}"
    );

    let row = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");
    assert_eq!(row.status, "paused");
    assert_eq!(row.migrated_products, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn resume_from_cursor_fetches_only_remaining_pages(pool: PgPool) {
    let server = MockServer::start().await;
    mount_product_count(&server, 4).await;

    // The first page must never be requested again on resume.
    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_string_contains("query Products"))
        .and(body_string_contains("\"after\":null"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_string_contains("page-2-cursor"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(shopify_products_page(&[3, 4], None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let migration_id = seed_migration(&pool, Platform::Shopify, products_only_config()).await;

    // Simulate a prior invocation that migrated page one (products 1 and 2)
    // and paused with the cursor pointing at page two.
    sqlx::query(
        "UPDATE store_migrations SET \
             status = 'paused', \
             total_products = 4, migrated_products = 2, \
             product_id_map = '{\"1\": 101, \"2\": 102}'::jsonb, \
             last_phase = 'products', last_cursor = 'page-2-cursor' \
         WHERE id = $1",
    )
    .bind(migration_id)
    .execute(&pool)
    .await
    .expect("simulate pause");

    let source = shopify_source(&server);
    let catalog = PgCatalog::new(pool.clone());
    let images = PgImageStore::new(pool.clone());

    let outcome = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("pipeline");
    assert!(matches!(outcome, Outcome::Completed), "got: {outcome:?}");

    let row = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");
    assert_eq!(row.status, "completed");
    assert_eq!(row.migrated_products, 4);
    let map = row.id_map(MigrationPhase::Products);
    assert_eq!(map.len(), 4);
    // Prior entries survive untouched.
    assert_eq!(map.get("1"), Some(&101));
    assert_eq!(map.get("2"), Some(&102));
    assert!(row.last_cursor.is_none());
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn transient_rate_limits_retry_and_complete_without_errors(pool: PgPool) {
    let server = MockServer::start().await;
    mount_product_count(&server, 1).await;

    // First two page fetches are throttled, then the page succeeds.
    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_string_contains("query Products"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_string_contains("query Products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(shopify_products_page(&[1], None)))
        .mount(&server)
        .await;

    let migration_id = seed_migration(&pool, Platform::Shopify, products_only_config()).await;
    let source = shopify_source(&server);
    let catalog = PgCatalog::new(pool.clone());
    let images = PgImageStore::new(pool.clone());

    let outcome = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("pipeline");
    assert!(matches!(outcome, Outcome::Completed), "got: {outcome:?}");

    let row = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");
    assert_eq!(row.migrated_products, 1);
    assert!(
        row.error_entries().is_empty(),
        "transient throttling must not be logged"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn persistent_rate_limiting_trips_breaker_and_pauses(pool: PgPool) {
    let server = MockServer::start().await;
    mount_product_count(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_string_contains("query Products"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let migration_id = seed_migration(&pool, Platform::Shopify, products_only_config()).await;
    let source = shopify_source(&server);
    let catalog = PgCatalog::new(pool.clone());
    let images = PgImageStore::new(pool.clone());

    let outcome = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("pipeline");
    assert!(
        matches!(
            outcome,
            Outcome::Paused {
                phase: MigrationPhase::Products,
                ..
            }
        ),
        "got: {outcome:?}"
    );

    let row = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");
    assert_eq!(row.status, "paused");
    let errors = row.error_entries();
    assert_eq!(errors.len(), 1, "exactly one rate_limit error");
    assert!(matches!(errors[0].kind, MigrationErrorKind::RateLimit));
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Catalog wrapper that cancels the migration (as a separate admin action
/// would) after the first successful product creation.
struct CancellingCatalog {
    inner: PgCatalog,
    pool: PgPool,
    migration_id: i64,
}

impl StoreCatalog for CancellingCatalog {
    async fn create_product(
        &self,
        store_id: i64,
        product: &storeforge_core::MigrationProduct,
    ) -> Result<i64, CatalogError> {
        let id = self.inner.create_product(store_id, product).await?;
        sqlx::query("UPDATE store_migrations SET status = 'cancelled' WHERE id = $1")
            .bind(self.migration_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError(e.to_string()))?;
        Ok(id)
    }

    async fn create_collection(
        &self,
        store_id: i64,
        name: &str,
        description: Option<&str>,
        product_ids: &[i64],
    ) -> Result<i64, CatalogError> {
        self.inner
            .create_collection(store_id, name, description, product_ids)
            .await
    }

    async fn create_customer(
        &self,
        store_id: i64,
        customer: &storeforge_core::MigrationCustomer,
    ) -> Result<i64, CatalogError> {
        self.inner.create_customer(store_id, customer).await
    }

    async fn create_coupon(
        &self,
        store_id: i64,
        coupon: &storeforge_core::MigrationCoupon,
    ) -> Result<i64, CatalogError> {
        self.inner.create_coupon(store_id, coupon).await
    }

    async fn create_order(
        &self,
        store_id: i64,
        order: &storeforge_core::MigrationOrder,
        customer_id: Option<i64>,
        item_product_ids: &[Option<i64>],
    ) -> Result<i64, CatalogError> {
        self.inner
            .create_order(store_id, order, customer_id, item_product_ids)
            .await
    }

    async fn delete_seed_products(&self, store_id: i64) -> Result<u64, CatalogError> {
        self.inner.delete_seed_products(store_id).await
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancellation_is_observed_at_the_next_page_boundary(pool: PgPool) {
    let server = MockServer::start().await;
    mount_product_count(&server, 2).await;

    mount_products_first_page(&server, shopify_products_page(&[1], Some("page-2-cursor"))).await;

    // Page two must never be fetched once the cancel lands.
    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_string_contains("page-2-cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(shopify_products_page(&[2], None)))
        .expect(0)
        .mount(&server)
        .await;

    let migration_id = seed_migration(&pool, Platform::Shopify, products_only_config()).await;
    let source = shopify_source(&server);
    let catalog = CancellingCatalog {
        inner: PgCatalog::new(pool.clone()),
        pool: pool.clone(),
        migration_id,
    };
    let images = PgImageStore::new(pool.clone());

    let outcome = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("pipeline");
    assert!(matches!(outcome, Outcome::Cancelled), "got: {outcome:?}");

    let row = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");
    assert_eq!(row.status, "cancelled");
    // The record processed before the cancel sticks.
    assert_eq!(row.migrated_products, 1);
}

// ---------------------------------------------------------------------------
// Per-record failures
// ---------------------------------------------------------------------------

/// Catalog wrapper that rejects one specific product title.
struct FailingCatalog {
    inner: PgCatalog,
    poison_title: String,
}

impl StoreCatalog for FailingCatalog {
    async fn create_product(
        &self,
        store_id: i64,
        product: &storeforge_core::MigrationProduct,
    ) -> Result<i64, CatalogError> {
        if product.title == self.poison_title {
            return Err(CatalogError("title rejected by catalog".to_string()));
        }
        self.inner.create_product(store_id, product).await
    }

    async fn create_collection(
        &self,
        store_id: i64,
        name: &str,
        description: Option<&str>,
        product_ids: &[i64],
    ) -> Result<i64, CatalogError> {
        self.inner
            .create_collection(store_id, name, description, product_ids)
            .await
    }

    async fn create_customer(
        &self,
        store_id: i64,
        customer: &storeforge_core::MigrationCustomer,
    ) -> Result<i64, CatalogError> {
        self.inner.create_customer(store_id, customer).await
    }

    async fn create_coupon(
        &self,
        store_id: i64,
        coupon: &storeforge_core::MigrationCoupon,
    ) -> Result<i64, CatalogError> {
        self.inner.create_coupon(store_id, coupon).await
    }

    async fn create_order(
        &self,
        store_id: i64,
        order: &storeforge_core::MigrationOrder,
        customer_id: Option<i64>,
        item_product_ids: &[Option<i64>],
    ) -> Result<i64, CatalogError> {
        self.inner
            .create_order(store_id, order, customer_id, item_product_ids)
            .await
    }

    async fn delete_seed_products(&self, store_id: i64) -> Result<u64, CatalogError> {
        self.inner.delete_seed_products(store_id).await
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn per_record_failure_is_logged_and_does_not_abort_the_phase(pool: PgPool) {
    let server = MockServer::start().await;
    mount_product_count(&server, 3).await;
    mount_products_first_page(&server, shopify_products_page(&[1, 2, 3], None)).await;

    let migration_id = seed_migration(&pool, Platform::Shopify, products_only_config()).await;
    let source = shopify_source(&server);
    let catalog = FailingCatalog {
        inner: PgCatalog::new(pool.clone()),
        poison_title: "Product 2".to_string(),
    };
    let images = PgImageStore::new(pool.clone());

    let outcome = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("pipeline");
    assert!(matches!(outcome, Outcome::Completed), "got: {outcome:?}");

    let row = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");
    assert_eq!(row.status, "completed");
    assert_eq!(row.migrated_products, 2);
    assert_eq!(row.failed_products, 1);

    let errors = row.error_entries();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].kind, MigrationErrorKind::Product));
    assert_eq!(errors[0].source_id.as_deref(), Some("2"));
    assert_eq!(errors[0].title.as_deref(), Some("Product 2"));
}

// ---------------------------------------------------------------------------
// Seed product cleanup
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn demo_products_are_deleted_before_the_first_import_only(pool: PgPool) {
    // Pre-populate a demo product with an image, as a fresh store has.
    let seed_id: i64 = sqlx::query_scalar(
        "INSERT INTO products (store_id, title, price, is_seed) \
         VALUES ($1, 'Demo product', 1.00, TRUE) RETURNING id",
    )
    .bind(STORE_ID)
    .fetch_one(&pool)
    .await
    .expect("seed product");
    sqlx::query("INSERT INTO product_images (product_id, url, position) VALUES ($1, 'x', 1)")
        .bind(seed_id)
        .execute(&pool)
        .await
        .expect("seed image");

    let server = MockServer::start().await;
    mount_product_count(&server, 1).await;
    mount_products_first_page(&server, shopify_products_page(&[1], None)).await;

    let migration_id = seed_migration(&pool, Platform::Shopify, products_only_config()).await;
    let source = shopify_source(&server);
    let catalog = PgCatalog::new(pool.clone());
    let images = PgImageStore::new(pool.clone());

    let outcome = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("pipeline");
    assert!(matches!(outcome, Outcome::Completed));

    let seeds_left: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE store_id = $1 AND is_seed")
            .bind(STORE_ID)
            .fetch_one(&pool)
            .await
            .expect("count");
    assert_eq!(seeds_left, 0, "demo products removed");

    let imported: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE store_id = $1 AND NOT is_seed")
            .bind(STORE_ID)
            .fetch_one(&pool)
            .await
            .expect("count");
    assert_eq!(imported, 1);
}

// ---------------------------------------------------------------------------
// Etsy end-to-end
// ---------------------------------------------------------------------------

fn etsy_listing(id: i64, state: &str) -> serde_json::Value {
    json!({
        "listing_id": id,
        "title": format!("Listing {id}"),
        "state": state,
        "quantity": 4,
        "price": { "amount": 2000, "divisor": 100 },
        "images": [
            { "listing_image_id": id * 10, "url_fullxfull": format!("https://i.etsystatic.com/{id}.jpg") }
        ]
    })
}

#[sqlx::test(migrations = "../../migrations")]
async fn etsy_shop_imports_importable_listings_only(pool: PgPool) {
    let server = MockServer::start().await;

    // The shop's importable listings plus one the transformer must skip.
    Mock::given(method("GET"))
        .and(path("/shops/shop-1/listings"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "results": [
                etsy_listing(9001, "active"),
                etsy_listing(9002, "active"),
                etsy_listing(9003, "inactive")
            ]
        })))
        .mount(&server)
        .await;

    let migration_id = seed_migration(&pool, Platform::Etsy, products_only_config()).await;
    let source = etsy_source(&server);
    let catalog = PgCatalog::new(pool.clone());
    let images = PgImageStore::new(pool.clone());

    let outcome = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("pipeline");
    assert!(matches!(outcome, Outcome::Completed), "got: {outcome:?}");

    let row = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");
    assert_eq!(row.status, "completed");
    assert_eq!(row.total_products, 3);
    assert_eq!(row.migrated_products, 2);
    assert_eq!(row.failed_products, 0);
    assert_eq!(row.id_map(MigrationPhase::Products).len(), 2);

    // Each imported product carried one image through the downloader.
    assert_eq!(row.total_images, 2);
    assert_eq!(row.migrated_images, 2);
    let images_created: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_images")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(images_created, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn etsy_collections_resolve_section_membership(pool: PgPool) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shops/shop-1/listings"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "results": [ etsy_listing(9001, "active"), etsy_listing(9002, "active") ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shops/shop-1/sections"))
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

    let config = MigrationConfig {
        import_customers: false,
        import_coupons: false,
        import_orders: false,
        ..MigrationConfig::default()
    };
    let migration_id = seed_migration(&pool, Platform::Etsy, config).await;
    let source = etsy_source(&server);
    let catalog = PgCatalog::new(pool.clone());
    let images = PgImageStore::new(pool.clone());

    let outcome = run_migration(&pool, &source, &catalog, &images, migration_id, &fast_options())
        .await
        .expect("pipeline");
    assert!(matches!(outcome, Outcome::Completed), "got: {outcome:?}");

    let row = storeforge_db::get_migration(&pool, migration_id)
        .await
        .expect("row");
    assert_eq!(row.migrated_products, 2);
    assert_eq!(row.migrated_collections, 1);

    // The collection links both migrated products.
    let linked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collection_products")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(linked, 2);
}
