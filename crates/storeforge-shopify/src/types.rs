//! Shopify Admin GraphQL wire types.
//!
//! Shapes follow the 2024-01 Admin API. Field names are camelCase on the
//! wire; money scalars arrive as decimal strings (e.g. `"162.00"`), weights
//! as floats with a separate unit enum, and ids as GIDs
//! (`gid://shopify/Product/123`).

use chrono::{DateTime, Utc};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Connection plumbing
// ---------------------------------------------------------------------------

/// Cursor pagination info from any GraphQL connection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

/// A GraphQL connection: `pageInfo` plus edges.
///
/// Nested connections are queried without `pageInfo`, so it defaults to
/// "no further pages".
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    #[serde(default)]
    pub page_info: PageInfo,
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

impl<T> Connection<T> {
    /// Unwraps the edge wrappers, preserving order.
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|edge| edge.node).collect()
    }
}

/// Result of a `*Count` query.
#[derive(Debug, Deserialize)]
pub struct CountResult {
    pub count: i64,
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ShopifyProductStatus {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "ARCHIVED")]
    Archived,
    #[serde(rename = "DRAFT")]
    Draft,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyProduct {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description_html: Option<String>,
    pub status: ShopifyProductStatus,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub variants: Connection<ShopifyVariant>,
    pub images: Connection<ShopifyImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ShopifyWeightUnit {
    #[serde(rename = "KILOGRAMS")]
    Kilograms,
    #[serde(rename = "GRAMS")]
    Grams,
    #[serde(rename = "POUNDS")]
    Pounds,
    #[serde(rename = "OUNCES")]
    Ounces,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyVariant {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub sku: Option<String>,
    /// Money scalar: decimal string, never null.
    pub price: String,
    #[serde(default)]
    pub compare_at_price: Option<String>,
    #[serde(default)]
    pub inventory_quantity: Option<i32>,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
    /// Weight in `weight_unit` units; absent when never set.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub weight_unit: Option<ShopifyWeightUnit>,
    #[serde(default = "default_true")]
    pub requires_shipping: bool,
}

#[derive(Debug, Deserialize)]
pub struct SelectedOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyImage {
    pub url: String,
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyCollection {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub products: Connection<ProductRef>,
}

#[derive(Debug, Deserialize)]
pub struct ProductRef {
    pub id: String,
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyCustomer {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email_marketing_consent: Option<MarketingConsent>,
    #[serde(default)]
    pub addresses: Vec<ShopifyAddress>,
    #[serde(default)]
    pub default_address: Option<ShopifyAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingConsent {
    pub marketing_state: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyAddress {
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FinancialStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "AUTHORIZED")]
    Authorized,
    #[serde(rename = "PARTIALLY_PAID")]
    PartiallyPaid,
    #[serde(rename = "PAID")]
    Paid,
    #[serde(rename = "PARTIALLY_REFUNDED")]
    PartiallyRefunded,
    #[serde(rename = "REFUNDED")]
    Refunded,
    #[serde(rename = "VOIDED")]
    Voided,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FulfillmentStatus {
    #[serde(rename = "UNFULFILLED")]
    Unfulfilled,
    #[serde(rename = "PARTIALLY_FULFILLED")]
    PartiallyFulfilled,
    #[serde(rename = "FULFILLED")]
    Fulfilled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyOrder {
    pub id: String,
    /// Display order number, e.g. `"#1001"`.
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_financial_status: Option<FinancialStatus>,
    pub display_fulfillment_status: FulfillmentStatus,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    #[serde(default)]
    pub payment_gateway_names: Vec<String>,
    #[serde(default)]
    pub subtotal_price_set: Option<MoneyBag>,
    #[serde(default)]
    pub total_shipping_price_set: Option<MoneyBag>,
    #[serde(default)]
    pub total_price_set: Option<MoneyBag>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    pub line_items: Connection<ShopifyLineItem>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyBag {
    pub shop_money: Money,
}

#[derive(Debug, Deserialize)]
pub struct Money {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyLineItem {
    pub title: String,
    pub quantity: i32,
    #[serde(default)]
    pub product: Option<ProductRef>,
    #[serde(default)]
    pub original_unit_price_set: Option<MoneyBag>,
}

// ---------------------------------------------------------------------------
// Discounts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyDiscountNode {
    pub id: String,
    pub code_discount: ShopifyDiscount,
}

/// The `codeDiscount` union, tagged on `__typename` and matched
/// exhaustively — no stringly-typed discrimination.
#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
pub enum ShopifyDiscount {
    #[serde(rename_all = "camelCase")]
    DiscountCodeBasic {
        codes: Connection<DiscountCode>,
        customer_gets: CustomerGets,
        #[serde(default)]
        minimum_requirement: Option<MinimumRequirement>,
        #[serde(default)]
        usage_limit: Option<i32>,
        #[serde(default)]
        ends_at: Option<DateTime<Utc>>,
    },
    #[serde(rename_all = "camelCase")]
    DiscountCodeFreeShipping {
        codes: Connection<DiscountCode>,
        #[serde(default)]
        minimum_requirement: Option<MinimumRequirement>,
        #[serde(default)]
        usage_limit: Option<i32>,
        #[serde(default)]
        ends_at: Option<DateTime<Utc>>,
    },
    /// Buy-X-get-Y promotions have no single-value representation in the
    /// internal coupon model and are skipped.
    DiscountCodeBxgy {},
    DiscountAutomaticBasic {},
    DiscountAutomaticFreeShipping {},
    DiscountAutomaticBxgy {},
    DiscountAutomaticApp {},
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct DiscountCode {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CustomerGets {
    pub value: DiscountValue,
}

/// The `customerGets.value` union.
#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
pub enum DiscountValue {
    DiscountPercentage {
        /// Decimal fraction on the wire: `0.15` means 15%.
        percentage: f64,
    },
    DiscountAmount {
        amount: Money,
    },
    #[serde(other)]
    Unknown,
}

/// The `minimumRequirement` union.
#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
pub enum MinimumRequirement {
    #[serde(rename_all = "camelCase")]
    DiscountMinimumSubtotal {
        greater_than_or_equal_to_subtotal: Money,
    },
    DiscountMinimumQuantity {},
    #[serde(other)]
    Unknown,
}

fn default_true() -> bool {
    true
}
