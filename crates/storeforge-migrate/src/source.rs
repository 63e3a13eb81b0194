//! Platform-neutral source abstraction over the Shopify and Etsy clients.
//!
//! A [`MigrationSource`] yields one transformed page per call: the platform
//! client fetches the raw page, the platform transformer normalizes it, and
//! skipped records (archived products, automatic discounts, …) are already
//! dropped. Cursors are opaque strings — a GraphQL cursor for Shopify, a
//! numeric offset serialized as text for Etsy.

use thiserror::Error;

use storeforge_core::{
    MigrationCollection, MigrationCoupon, MigrationCustomer, MigrationOrder, MigrationPhase,
    MigrationProduct, Platform, ProductStatus,
};
use storeforge_etsy::{EtsyClient, EtsyError};
use storeforge_shopify::{ShopifyAdminClient, ShopifyError};

/// Errors a source can produce, reduced to what the pipeline acts on.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("source authentication failed: {0}")]
    Auth(String),

    #[error("source API error: {0}")]
    Api(String),
}

impl From<ShopifyError> for SourceError {
    fn from(err: ShopifyError) -> Self {
        match err {
            ShopifyError::RateLimited { retry_after_secs } => {
                SourceError::RateLimited { retry_after_secs }
            }
            ShopifyError::InvalidHmac | ShopifyError::OAuthExchange { .. } => {
                SourceError::Auth(err.to_string())
            }
            other => SourceError::Api(other.to_string()),
        }
    }
}

impl From<EtsyError> for SourceError {
    fn from(err: EtsyError) -> Self {
        match err {
            EtsyError::RateLimited { retry_after_secs } => {
                SourceError::RateLimited { retry_after_secs }
            }
            EtsyError::OAuthExchange { .. } => SourceError::Auth(err.to_string()),
            other => SourceError::Api(other.to_string()),
        }
    }
}

/// One transformed page from a source platform.
#[derive(Debug)]
pub struct SourcePage<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
    /// Platform-reported total for this resource, when the page envelope
    /// carries one (Etsy does; Shopify counts come from dedicated queries).
    pub total: Option<i64>,
}

/// A connected source platform, paged and normalized.
///
/// Implementations are used through generics — the pipeline is monomorphized
/// per platform.
pub trait MigrationSource {
    fn platform(&self) -> Platform;

    /// Whether the platform supports migrating this phase at all.
    fn supports(&self, phase: MigrationPhase) -> bool;

    /// Whether a dedicated count query exists for this phase. When it does
    /// not, the pipeline reports totals as records-seen-so-far (or trusts
    /// the total carried on each [`SourcePage`]).
    fn has_total_count(&self, phase: MigrationPhase) -> bool;

    /// Total record count for a phase, fetched once at phase entry. Only
    /// called when [`Self::has_total_count`] is `true`.
    fn count(
        &self,
        phase: MigrationPhase,
    ) -> impl std::future::Future<Output = Result<Option<i64>, SourceError>> + Send;

    fn fetch_products(
        &self,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<SourcePage<MigrationProduct>, SourceError>> + Send;

    fn fetch_collections(
        &self,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<SourcePage<MigrationCollection>, SourceError>> + Send;

    fn fetch_customers(
        &self,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<SourcePage<MigrationCustomer>, SourceError>> + Send;

    fn fetch_coupons(
        &self,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<SourcePage<MigrationCoupon>, SourceError>> + Send;

    fn fetch_orders(
        &self,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<SourcePage<MigrationOrder>, SourceError>> + Send;
}

fn empty_page<T>() -> SourcePage<T> {
    SourcePage {
        items: Vec::new(),
        next_cursor: None,
        total: Some(0),
    }
}

// ---------------------------------------------------------------------------
// Shopify
// ---------------------------------------------------------------------------

/// Shopify Admin GraphQL source: cursor pagination, every phase supported.
pub struct ShopifySource {
    client: ShopifyAdminClient,
    product_status: ProductStatus,
}

impl ShopifySource {
    #[must_use]
    pub fn new(client: ShopifyAdminClient, product_status: ProductStatus) -> Self {
        Self {
            client,
            product_status,
        }
    }
}

impl MigrationSource for ShopifySource {
    fn platform(&self) -> Platform {
        Platform::Shopify
    }

    fn supports(&self, _phase: MigrationPhase) -> bool {
        true
    }

    fn has_total_count(&self, phase: MigrationPhase) -> bool {
        !matches!(phase, MigrationPhase::Coupons)
    }

    async fn count(&self, phase: MigrationPhase) -> Result<Option<i64>, SourceError> {
        let count = match phase {
            MigrationPhase::Products => Some(self.client.count_products().await?),
            MigrationPhase::Collections => Some(self.client.count_collections().await?),
            MigrationPhase::Customers => Some(self.client.count_customers().await?),
            MigrationPhase::Orders => Some(self.client.count_orders().await?),
            // No count query exists for code discounts; totals are reported
            // as records seen so far.
            MigrationPhase::Coupons => None,
        };
        Ok(count)
    }

    async fn fetch_products(
        &self,
        cursor: Option<&str>,
    ) -> Result<SourcePage<MigrationProduct>, SourceError> {
        let (raw, next_cursor) = self.client.fetch_products_page(cursor).await?;
        let items = raw
            .into_iter()
            .filter_map(|product| storeforge_shopify::transform::product(product, self.product_status))
            .collect();
        Ok(SourcePage {
            items,
            next_cursor,
            total: None,
        })
    }

    async fn fetch_collections(
        &self,
        cursor: Option<&str>,
    ) -> Result<SourcePage<MigrationCollection>, SourceError> {
        let (raw, next_cursor) = self.client.fetch_collections_page(cursor).await?;
        let items = raw
            .into_iter()
            .map(storeforge_shopify::transform::collection)
            .collect();
        Ok(SourcePage {
            items,
            next_cursor,
            total: None,
        })
    }

    async fn fetch_customers(
        &self,
        cursor: Option<&str>,
    ) -> Result<SourcePage<MigrationCustomer>, SourceError> {
        let (raw, next_cursor) = self.client.fetch_customers_page(cursor).await?;
        let items = raw
            .into_iter()
            .filter_map(storeforge_shopify::transform::customer)
            .collect();
        Ok(SourcePage {
            items,
            next_cursor,
            total: None,
        })
    }

    async fn fetch_coupons(
        &self,
        cursor: Option<&str>,
    ) -> Result<SourcePage<MigrationCoupon>, SourceError> {
        let (raw, next_cursor) = self.client.fetch_discounts_page(cursor).await?;
        let items = raw
            .into_iter()
            .filter_map(storeforge_shopify::transform::coupon)
            .collect();
        Ok(SourcePage {
            items,
            next_cursor,
            total: None,
        })
    }

    async fn fetch_orders(
        &self,
        cursor: Option<&str>,
    ) -> Result<SourcePage<MigrationOrder>, SourceError> {
        let (raw, next_cursor) = self.client.fetch_orders_page(cursor).await?;
        let items = raw
            .into_iter()
            .map(storeforge_shopify::transform::order)
            .collect();
        Ok(SourcePage {
            items,
            next_cursor,
            total: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Etsy
// ---------------------------------------------------------------------------

/// Etsy source: offset pagination serialized into the cursor string. Only
/// products and collections exist on Etsy's side.
pub struct EtsySource {
    client: EtsyClient,
    shop_id: String,
    product_status: ProductStatus,
}

impl EtsySource {
    #[must_use]
    pub fn new(client: EtsyClient, shop_id: &str, product_status: ProductStatus) -> Self {
        Self {
            client,
            shop_id: shop_id.to_owned(),
            product_status,
        }
    }
}

/// Parses an Etsy offset cursor; absent or malformed cursors restart at 0.
fn parse_offset(cursor: Option<&str>) -> i64 {
    cursor.and_then(|c| c.parse::<i64>().ok()).unwrap_or(0)
}

impl MigrationSource for EtsySource {
    fn platform(&self) -> Platform {
        Platform::Etsy
    }

    fn supports(&self, phase: MigrationPhase) -> bool {
        matches!(
            phase,
            MigrationPhase::Products | MigrationPhase::Collections
        )
    }

    fn has_total_count(&self, _phase: MigrationPhase) -> bool {
        // Etsy's page envelope carries the true total; no separate call.
        false
    }

    async fn count(&self, _phase: MigrationPhase) -> Result<Option<i64>, SourceError> {
        Ok(None)
    }

    async fn fetch_products(
        &self,
        cursor: Option<&str>,
    ) -> Result<SourcePage<MigrationProduct>, SourceError> {
        let offset = parse_offset(cursor);
        let page = self.client.fetch_listings_page(&self.shop_id, offset).await?;

        let fetched = i64::try_from(page.results.len()).unwrap_or(0);
        let next_offset = offset + fetched;
        let next_cursor = if fetched > 0 && next_offset < page.count {
            Some(next_offset.to_string())
        } else {
            None
        };

        let items = page
            .results
            .into_iter()
            .filter_map(|listing| storeforge_etsy::transform::listing(listing, self.product_status))
            .collect();

        Ok(SourcePage {
            items,
            next_cursor,
            total: Some(page.count),
        })
    }

    async fn fetch_collections(
        &self,
        _cursor: Option<&str>,
    ) -> Result<SourcePage<MigrationCollection>, SourceError> {
        // Sections are not paginated; one page covers the shop. Each section
        // needs a second call to resolve its member listing ids.
        let sections = self.client.fetch_sections(&self.shop_id).await?;
        let total = sections.count;

        let mut items = Vec::with_capacity(sections.results.len());
        for section in sections.results {
            let listing_ids = self
                .client
                .fetch_section_listing_ids(&self.shop_id, section.shop_section_id)
                .await?;
            items.push(storeforge_etsy::transform::section(section, &listing_ids));
        }

        Ok(SourcePage {
            items,
            next_cursor: None,
            total: Some(total),
        })
    }

    async fn fetch_customers(
        &self,
        _cursor: Option<&str>,
    ) -> Result<SourcePage<MigrationCustomer>, SourceError> {
        Ok(empty_page())
    }

    async fn fetch_coupons(
        &self,
        _cursor: Option<&str>,
    ) -> Result<SourcePage<MigrationCoupon>, SourceError> {
        Ok(empty_page())
    }

    async fn fetch_orders(
        &self,
        _cursor: Option<&str>,
    ) -> Result<SourcePage<MigrationOrder>, SourceError> {
        Ok(empty_page())
    }
}
