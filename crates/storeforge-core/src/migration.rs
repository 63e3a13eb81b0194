//! Migration domain types shared across the workspace: source platform,
//! status state machine, phase ordering, per-entity counters, and the bounded
//! error log entry shape.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source commerce platform a migration imports from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Shopify,
    Etsy,
}

impl Platform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Shopify => "shopify",
            Platform::Etsy => "etsy",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shopify" => Ok(Platform::Shopify),
            "etsy" => Ok(Platform::Etsy),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Migration lifecycle status.
///
/// Transitions: `connected → running → {paused | completed | failed |
/// cancelled}`. `paused` and `cancelled` can re-enter `running`; `completed`
/// and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Connected,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl MigrationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationStatus::Connected => "connected",
            MigrationStatus::Running => "running",
            MigrationStatus::Paused => "paused",
            MigrationStatus::Completed => "completed",
            MigrationStatus::Failed => "failed",
            MigrationStatus::Cancelled => "cancelled",
        }
    }

    /// `true` for states the pipeline will never leave.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, MigrationStatus::Completed | MigrationStatus::Failed)
    }

    /// `true` for states a new pipeline invocation may claim.
    #[must_use]
    pub fn is_resumable(self) -> bool {
        matches!(
            self,
            MigrationStatus::Connected | MigrationStatus::Paused | MigrationStatus::Cancelled
        )
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(MigrationStatus::Connected),
            "running" => Ok(MigrationStatus::Running),
            "paused" => Ok(MigrationStatus::Paused),
            "completed" => Ok(MigrationStatus::Completed),
            "failed" => Ok(MigrationStatus::Failed),
            "cancelled" => Ok(MigrationStatus::Cancelled),
            other => Err(format!("unknown migration status: {other}")),
        }
    }
}

/// One entity type's migration sub-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationPhase {
    Products,
    Collections,
    Customers,
    Coupons,
    Orders,
}

impl MigrationPhase {
    /// The fixed order phases run in within a single pipeline invocation.
    pub const ORDER: [MigrationPhase; 5] = [
        MigrationPhase::Products,
        MigrationPhase::Collections,
        MigrationPhase::Customers,
        MigrationPhase::Coupons,
        MigrationPhase::Orders,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationPhase::Products => "products",
            MigrationPhase::Collections => "collections",
            MigrationPhase::Customers => "customers",
            MigrationPhase::Coupons => "coupons",
            MigrationPhase::Orders => "orders",
        }
    }

    /// Error-log kind used for per-record failures in this phase.
    #[must_use]
    pub fn error_kind(self) -> MigrationErrorKind {
        match self {
            MigrationPhase::Products => MigrationErrorKind::Product,
            MigrationPhase::Collections => MigrationErrorKind::Collection,
            MigrationPhase::Customers => MigrationErrorKind::Customer,
            MigrationPhase::Coupons => MigrationErrorKind::Coupon,
            MigrationPhase::Orders => MigrationErrorKind::Order,
        }
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(MigrationPhase::Products),
            "collections" => Ok(MigrationPhase::Collections),
            "customers" => Ok(MigrationPhase::Customers),
            "coupons" => Ok(MigrationPhase::Coupons),
            "orders" => Ok(MigrationPhase::Orders),
            other => Err(format!("unknown migration phase: {other}")),
        }
    }
}

/// Status assigned to products created by the import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
}

impl ProductStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Active => "active",
        }
    }
}

/// User-supplied migration configuration, immutable for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "default_true")]
    pub import_products: bool,
    #[serde(default = "default_true")]
    pub import_collections: bool,
    #[serde(default = "default_true")]
    pub import_customers: bool,
    #[serde(default = "default_true")]
    pub import_coupons: bool,
    #[serde(default = "default_true")]
    pub import_orders: bool,
    #[serde(default = "default_product_status")]
    pub product_status: ProductStatus,
}

fn default_true() -> bool {
    true
}

fn default_product_status() -> ProductStatus {
    ProductStatus::Draft
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            import_products: true,
            import_collections: true,
            import_customers: true,
            import_coupons: true,
            import_orders: true,
            product_status: ProductStatus::Draft,
        }
    }
}

impl MigrationConfig {
    /// Whether the user opted this phase in.
    #[must_use]
    pub fn phase_enabled(&self, phase: MigrationPhase) -> bool {
        match phase {
            MigrationPhase::Products => self.import_products,
            MigrationPhase::Collections => self.import_collections,
            MigrationPhase::Customers => self.import_customers,
            MigrationPhase::Coupons => self.import_coupons,
            MigrationPhase::Orders => self.import_orders,
        }
    }
}

/// Per-entity progress counters for one migration.
///
/// The pipeline accumulates these in memory and flushes absolute values in a
/// single version-guarded update, so no read-modify-write increments ever hit
/// the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationCounters {
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
}

impl MigrationCounters {
    #[must_use]
    pub fn total_for(&self, phase: MigrationPhase) -> i32 {
        match phase {
            MigrationPhase::Products => self.total_products,
            MigrationPhase::Collections => self.total_collections,
            MigrationPhase::Customers => self.total_customers,
            MigrationPhase::Coupons => self.total_coupons,
            MigrationPhase::Orders => self.total_orders,
        }
    }

    pub fn set_total(&mut self, phase: MigrationPhase, total: i32) {
        match phase {
            MigrationPhase::Products => self.total_products = total,
            MigrationPhase::Collections => self.total_collections = total,
            MigrationPhase::Customers => self.total_customers = total,
            MigrationPhase::Coupons => self.total_coupons = total,
            MigrationPhase::Orders => self.total_orders = total,
        }
    }

    pub fn record_migrated(&mut self, phase: MigrationPhase) {
        match phase {
            MigrationPhase::Products => self.migrated_products += 1,
            MigrationPhase::Collections => self.migrated_collections += 1,
            MigrationPhase::Customers => self.migrated_customers += 1,
            MigrationPhase::Coupons => self.migrated_coupons += 1,
            MigrationPhase::Orders => self.migrated_orders += 1,
        }
    }

    pub fn record_failed(&mut self, phase: MigrationPhase) {
        match phase {
            MigrationPhase::Products => self.failed_products += 1,
            MigrationPhase::Collections => self.failed_collections += 1,
            MigrationPhase::Customers => self.failed_customers += 1,
            MigrationPhase::Coupons => self.failed_coupons += 1,
            MigrationPhase::Orders => self.failed_orders += 1,
        }
    }
}

/// Classification for entries in a migration's bounded error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationErrorKind {
    Auth,
    RateLimit,
    Product,
    Collection,
    Order,
    Customer,
    Coupon,
    Image,
    Pipeline,
}

/// One entry in the append-only error log (capped at 100 in the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationErrorEntry {
    pub kind: MigrationErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl MigrationErrorEntry {
    #[must_use]
    pub fn new(kind: MigrationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            source_id: None,
            title: None,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_record(mut self, source_id: impl Into<String>, title: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self.title = Some(title.into());
        self
    }
}
