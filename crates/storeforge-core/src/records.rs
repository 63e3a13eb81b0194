//! Transient normalized records produced by the platform transformers and
//! consumed by the catalog writer. These are never persisted as-is; each
//! carries the platform-native `source_id` used as the idempotency key
//! against the migration's ID maps.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::migration::ProductStatus;

/// A normalized product ready for creation, with its variants and images.
#[derive(Debug, Clone)]
pub struct MigrationProduct {
    pub source_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub quantity: i32,
    pub track_quantity: bool,
    /// Weight in grams. `None` when the source weight is zero or absent.
    pub weight_grams: Option<Decimal>,
    pub requires_shipping: bool,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub status: ProductStatus,
    pub featured: bool,
    pub variants: Vec<MigrationVariant>,
    pub images: Vec<MigrationImage>,
}

/// A purchasable variant of a [`MigrationProduct`].
#[derive(Debug, Clone)]
pub struct MigrationVariant {
    /// Platform variant id where the platform has real variants; `None` for
    /// synthesized variants (Etsy).
    pub source_id: Option<String>,
    pub title: String,
    pub sku: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub quantity: i32,
    /// Option dimension name → value (e.g. `"Size" → "M"`). Ordered so
    /// variant titles render deterministically.
    pub options: BTreeMap<String, String>,
    pub weight_grams: Option<Decimal>,
}

/// An externally hosted product image awaiting re-upload.
#[derive(Debug, Clone)]
pub struct MigrationImage {
    pub url: String,
    /// 1-based display position.
    pub position: i32,
}

/// A normalized collection with its member products by source id.
#[derive(Debug, Clone)]
pub struct MigrationCollection {
    pub source_id: String,
    pub name: String,
    pub description: Option<String>,
    pub product_source_ids: Vec<String>,
}

/// A normalized customer. Customers without an email are skipped upstream.
#[derive(Debug, Clone)]
pub struct MigrationCustomer {
    pub source_id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub accepts_marketing: bool,
    pub addresses: Vec<MigrationCustomerAddress>,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationCustomerAddress {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub is_default: bool,
}

/// Discount classification for imported coupons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage,
    FixedAmount,
    FreeShipping,
}

impl DiscountKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::FixedAmount => "fixed_amount",
            DiscountKind::FreeShipping => "free_shipping",
        }
    }
}

/// A normalized code-based coupon. Automatic discounts never reach this type.
#[derive(Debug, Clone)]
pub struct MigrationCoupon {
    pub source_id: String,
    pub code: String,
    pub discount_type: DiscountKind,
    /// Percentage on a 0–100 scale, currency amount, or 0 for free shipping.
    pub discount_value: Decimal,
    pub min_purchase: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Reduced payment status for imported orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// Reduced fulfillment status for imported orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Confirmed,
    Processing,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

/// Payment method inferred from the source gateway name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Razorpay,
    Cod,
}

impl PaymentMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Razorpay => "razorpay",
            PaymentMethod::Cod => "cod",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized historical order.
#[derive(Debug, Clone)]
pub struct MigrationOrder {
    pub source_id: String,
    /// Imported order numbers carry an `IMP-` prefix so they never collide
    /// with natively generated numbers.
    pub order_number: String,
    pub customer_source_id: Option<String>,
    pub email: Option<String>,
    pub items: Vec<MigrationOrderItem>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub placed_at: Option<DateTime<Utc>>,
}

/// One line item on a [`MigrationOrder`].
#[derive(Debug, Clone)]
pub struct MigrationOrderItem {
    /// Source product id, used to link against the product ID map. `None`
    /// when the source line item no longer references a product.
    pub product_source_id: Option<String>,
    pub title: String,
    pub quantity: i32,
    pub price: Decimal,
}
