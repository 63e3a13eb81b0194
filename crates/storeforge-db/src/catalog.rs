//! Catalog writer: creation of internal store entities from normalized
//! migration records.
//!
//! These are the store-side counterparts of the transient records in
//! `storeforge_core::records`. Each creation returns the generated internal
//! id so the pipeline can record it in the relevant ID map. Multi-row writes
//! (product + variants, order + items) run inside one transaction.

use rust_decimal::Decimal;
use sqlx::PgPool;

use storeforge_core::{
    MigrationCoupon, MigrationCustomer, MigrationOrder, MigrationProduct, ProductStatus,
};

use crate::DbError;

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Creates a product with its variants. Returns the internal product id.
///
/// Images are not written here — they go through the image downloader, which
/// re-uploads each external URL and records it via [`record_product_image`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; the transaction rolls back
/// and no partial product remains.
pub async fn create_product(
    pool: &PgPool,
    store_id: i64,
    product: &MigrationProduct,
) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let product_id: i64 = sqlx::query_scalar(
        "INSERT INTO products \
             (store_id, title, description, price, compare_at_price, sku, quantity, \
              track_quantity, weight_grams, requires_shipping, categories, tags, \
              status, featured) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         RETURNING id",
    )
    .bind(store_id)
    .bind(&product.title)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.compare_at_price)
    .bind(&product.sku)
    .bind(product.quantity)
    .bind(product.track_quantity)
    .bind(product.weight_grams)
    .bind(product.requires_shipping)
    .bind(&product.categories)
    .bind(&product.tags)
    .bind(match product.status {
        ProductStatus::Draft => "draft",
        ProductStatus::Active => "active",
    })
    .bind(product.featured)
    .fetch_one(&mut *tx)
    .await?;

    for variant in &product.variants {
        let options = serde_json::to_value(&variant.options).unwrap_or_default();
        sqlx::query(
            "INSERT INTO product_variants \
                 (product_id, title, sku, price, compare_at_price, quantity, options, \
                  weight_grams) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(product_id)
        .bind(&variant.title)
        .bind(&variant.sku)
        .bind(variant.price)
        .bind(variant.compare_at_price)
        .bind(variant.quantity)
        .bind(options)
        .bind(variant.weight_grams)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(product_id)
}

/// Records one successfully re-uploaded product image.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_product_image(
    pool: &PgPool,
    product_id: i64,
    url: &str,
    position: i32,
) -> Result<(), DbError> {
    sqlx::query("INSERT INTO product_images (product_id, url, position) VALUES ($1, $2, $3)")
        .bind(product_id)
        .bind(url)
        .bind(position)
        .execute(pool)
        .await?;

    Ok(())
}

/// Deletes the demo/seed products pre-populated for a new store: images
/// first, then variants, then the product rows. Returns how many products
/// were removed.
///
/// The pipeline gates this on the product ID map being empty, so it runs at
/// most once per migration.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any delete fails; the transaction rolls back.
pub async fn delete_seed_products(pool: &PgPool, store_id: i64) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM product_images WHERE product_id IN \
             (SELECT id FROM products WHERE store_id = $1 AND is_seed)",
    )
    .bind(store_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "DELETE FROM product_variants WHERE product_id IN \
             (SELECT id FROM products WHERE store_id = $1 AND is_seed)",
    )
    .bind(store_id)
    .execute(&mut *tx)
    .await?;

    let deleted = sqlx::query("DELETE FROM products WHERE store_id = $1 AND is_seed")
        .bind(store_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(deleted)
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Creates a collection and links its member products. Returns the internal
/// collection id. `product_ids` holds already-resolved internal ids.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; the transaction rolls back.
pub async fn create_collection(
    pool: &PgPool,
    store_id: i64,
    name: &str,
    description: Option<&str>,
    product_ids: &[i64],
) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let collection_id: i64 = sqlx::query_scalar(
        "INSERT INTO collections (store_id, name, description) \
         VALUES ($1, $2, $3) \
         RETURNING id",
    )
    .bind(store_id)
    .bind(name)
    .bind(description)
    .fetch_one(&mut *tx)
    .await?;

    for product_id in product_ids {
        sqlx::query(
            "INSERT INTO collection_products (collection_id, product_id) \
             VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(collection_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(collection_id)
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

/// Creates a customer with addresses. Returns the internal customer id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; the transaction rolls back.
pub async fn create_customer(
    pool: &PgPool,
    store_id: i64,
    customer: &MigrationCustomer,
) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let customer_id: i64 = sqlx::query_scalar(
        "INSERT INTO customers (store_id, email, name, phone, accepts_marketing) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(store_id)
    .bind(&customer.email)
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(customer.accepts_marketing)
    .fetch_one(&mut *tx)
    .await?;

    for address in &customer.addresses {
        sqlx::query(
            "INSERT INTO customer_addresses \
                 (customer_id, line1, line2, city, state, country, zip, phone, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(customer_id)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.country)
        .bind(&address.zip)
        .bind(&address.phone)
        .bind(address.is_default)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(customer_id)
}

// ---------------------------------------------------------------------------
// Coupons
// ---------------------------------------------------------------------------

/// Creates a coupon. Returns the internal coupon id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_coupon(
    pool: &PgPool,
    store_id: i64,
    coupon: &MigrationCoupon,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO coupons \
             (store_id, code, discount_type, discount_value, min_purchase, usage_limit, \
              expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(store_id)
    .bind(&coupon.code)
    .bind(coupon.discount_type.as_str())
    .bind(coupon.discount_value)
    .bind(coupon.min_purchase)
    .bind(coupon.usage_limit)
    .bind(coupon.expires_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Creates an order with its line items. Returns the internal order id.
///
/// `customer_id` is the already-resolved internal customer (if the source
/// customer was migrated); `item_product_ids` aligns index-for-index with
/// `order.items`, `None` where the source product was not migrated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; the transaction rolls back.
pub async fn create_order(
    pool: &PgPool,
    store_id: i64,
    order: &MigrationOrder,
    customer_id: Option<i64>,
    item_product_ids: &[Option<i64>],
) -> Result<i64, DbError> {
    debug_assert_eq!(order.items.len(), item_product_ids.len());

    let mut tx = pool.begin().await?;

    let order_id: i64 = sqlx::query_scalar(
        "INSERT INTO orders \
             (store_id, order_number, customer_id, email, subtotal, shipping, total, \
              payment_status, order_status, payment_method, placed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, COALESCE($11, NOW())) \
         RETURNING id",
    )
    .bind(store_id)
    .bind(&order.order_number)
    .bind(customer_id)
    .bind(&order.email)
    .bind(order.subtotal)
    .bind(order.shipping)
    .bind(order.total)
    .bind(order.payment_status.as_str())
    .bind(order.order_status.as_str())
    .bind(order.payment_method.as_str())
    .bind(order.placed_at)
    .fetch_one(&mut *tx)
    .await?;

    for (item, product_id) in order.items.iter().zip(item_product_ids) {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, title, quantity, price) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(&item.title)
        .bind(item.quantity)
        .bind(item.price)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(order_id)
}

/// Sum of order line totals, used when the source omits a subtotal.
#[must_use]
pub fn line_items_subtotal(items: &[storeforge_core::MigrationOrderItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum()
}
