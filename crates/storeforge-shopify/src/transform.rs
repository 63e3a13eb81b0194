//! Normalization from Shopify Admin API shapes to the internal migration
//! records. Pure functions, no I/O; records that cannot be imported
//! (archived products, automatic discounts, customers without email,
//! malformed money values) return `None` and the caller drops them.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use storeforge_core::{
    DiscountKind, MigrationCollection, MigrationCoupon, MigrationCustomer,
    MigrationCustomerAddress, MigrationImage, MigrationOrder, MigrationOrderItem,
    MigrationProduct, MigrationVariant, OrderStatus, PaymentMethod, PaymentStatus, ProductStatus,
};

use crate::types::{
    Connection, CustomerGets, DiscountCode, DiscountValue, FinancialStatus, FulfillmentStatus,
    MinimumRequirement, MoneyBag, ShopifyAddress, ShopifyCollection, ShopifyCustomer,
    ShopifyDiscount, ShopifyDiscountNode, ShopifyOrder, ShopifyProduct, ShopifyProductStatus,
    ShopifyVariant, ShopifyWeightUnit,
};

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new("<[^>]*>").expect("valid regex"));

/// Prefix applied to imported order numbers so they never collide with
/// natively generated ones.
pub const ORDER_NUMBER_PREFIX: &str = "IMP-";

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Normalizes a Shopify product, or `None` when it should be skipped:
/// archived products, products without variants, and products whose money
/// fields do not parse.
#[must_use]
pub fn product(product: ShopifyProduct, target_status: ProductStatus) -> Option<MigrationProduct> {
    if matches!(
        product.status,
        ShopifyProductStatus::Archived | ShopifyProductStatus::Unknown
    ) {
        return None;
    }

    let source_id = gid_tail(&product.id).to_string();
    let raw_variants = product.variants.into_nodes();
    let requires_shipping = raw_variants.iter().any(|v| v.requires_shipping);

    let variants = raw_variants
        .into_iter()
        .map(variant)
        .collect::<Option<Vec<_>>>()?;
    let first = variants.first()?;

    let price = first.price;
    let compare_at_price = first.compare_at_price;
    let sku = first.sku.clone();
    let weight_grams = first.weight_grams;
    let quantity = variants.iter().map(|v| v.quantity).sum::<i32>().max(0);

    let images = product
        .images
        .into_nodes()
        .into_iter()
        .enumerate()
        .map(|(idx, image)| MigrationImage {
            url: image.url,
            position: i32::try_from(idx).unwrap_or(i32::MAX - 1) + 1,
        })
        .collect();

    // A lone "Default Title" variant is Shopify's way of saying the product
    // has no real options; fold it into the product itself.
    let variants = if variants.len() == 1 && variants[0].options.is_empty() {
        Vec::new()
    } else {
        variants
    };

    Some(MigrationProduct {
        source_id,
        title: product.title,
        description: product.description_html.as_deref().and_then(strip_html),
        price,
        compare_at_price,
        sku,
        quantity,
        track_quantity: true,
        weight_grams,
        requires_shipping,
        categories: product
            .product_type
            .filter(|t| !t.is_empty())
            .into_iter()
            .collect(),
        tags: product.tags,
        status: target_status,
        featured: false,
        variants,
        images,
    })
}

fn variant(variant: ShopifyVariant) -> Option<MigrationVariant> {
    let price = parse_money(&variant.price)?;
    let compare_at_price = match &variant.compare_at_price {
        Some(raw) => Some(parse_money(raw)?),
        None => None,
    };

    let options: BTreeMap<String, String> = variant
        .selected_options
        .into_iter()
        .filter(|option| !(option.name == "Title" && option.value == "Default Title"))
        .map(|option| (option.name, option.value))
        .collect();

    Some(MigrationVariant {
        source_id: Some(gid_tail(&variant.id).to_string()),
        title: variant.title,
        sku: variant.sku.filter(|s| !s.is_empty()),
        price,
        compare_at_price,
        quantity: variant.inventory_quantity.unwrap_or(0).max(0),
        options,
        weight_grams: weight_to_grams(variant.weight, variant.weight_unit),
    })
}

/// Converts a weight into grams. Zero or absent weights yield `None`.
#[must_use]
pub fn weight_to_grams(weight: Option<f64>, unit: Option<ShopifyWeightUnit>) -> Option<Decimal> {
    let value = weight.filter(|w| *w > 0.0)?;
    let value = Decimal::from_f64(value)?;

    let factor = match unit.unwrap_or(ShopifyWeightUnit::Grams) {
        ShopifyWeightUnit::Grams => Decimal::ONE,
        ShopifyWeightUnit::Kilograms => Decimal::new(1000, 0),
        ShopifyWeightUnit::Pounds => Decimal::new(453_592, 3),
        ShopifyWeightUnit::Ounces => Decimal::new(283_495, 4),
    };

    Some((value * factor).normalize())
}

/// Strips HTML tags and unescapes the common entities, collapsing
/// whitespace. Returns `None` when nothing but markup remained.
#[must_use]
pub fn strip_html(html: &str) -> Option<String> {
    let without_tags = HTML_TAG.replace_all(html, " ");
    let unescaped = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    let collapsed = unescaped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Normalizes a Shopify collection; collections map 1:1.
#[must_use]
pub fn collection(collection: ShopifyCollection) -> MigrationCollection {
    MigrationCollection {
        source_id: gid_tail(&collection.id).to_string(),
        name: collection.title,
        description: collection.description.filter(|d| !d.is_empty()),
        product_source_ids: collection
            .products
            .into_nodes()
            .into_iter()
            .map(|product| gid_tail(&product.id).to_string())
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

/// Normalizes a Shopify customer, or `None` when no email exists — a login
/// identity cannot be created without one.
#[must_use]
pub fn customer(customer: ShopifyCustomer) -> Option<MigrationCustomer> {
    let email = customer
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())?;

    let name = display_name(
        customer.first_name.as_deref(),
        customer.last_name.as_deref(),
        &email,
    );

    let accepts_marketing = customer
        .email_marketing_consent
        .is_some_and(|consent| consent.marketing_state == "SUBSCRIBED");

    let default_address = customer.default_address;
    let addresses = customer
        .addresses
        .iter()
        .map(|addr| address(addr, default_address.as_ref()))
        .collect();

    Some(MigrationCustomer {
        source_id: gid_tail(&customer.id).to_string(),
        email,
        name,
        phone: customer.phone.filter(|p| !p.is_empty()),
        accepts_marketing,
        addresses,
    })
}

/// Synthesizes a display name from first/last name, falling back to the
/// email local-part.
#[must_use]
pub fn display_name(first: Option<&str>, last: Option<&str>, email: &str) -> String {
    let joined = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        email.split('@').next().unwrap_or(email).to_string()
    } else {
        joined
    }
}

fn address(
    addr: &ShopifyAddress,
    default_address: Option<&ShopifyAddress>,
) -> MigrationCustomerAddress {
    let is_default = default_address
        .is_some_and(|d| d.address1 == addr.address1 && d.zip == addr.zip && d.city == addr.city);

    MigrationCustomerAddress {
        line1: addr.address1.clone(),
        line2: addr.address2.clone(),
        city: addr.city.clone(),
        state: addr.province.clone(),
        country: addr.country.clone(),
        zip: addr.zip.clone(),
        phone: addr.phone.clone(),
        is_default,
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Normalizes a Shopify order.
#[must_use]
pub fn order(order: ShopifyOrder) -> MigrationOrder {
    let source_id = gid_tail(&order.id).to_string();
    let order_number = format!(
        "{ORDER_NUMBER_PREFIX}{}",
        order.name.trim_start_matches('#')
    );

    let (payment_status, order_status) = map_order_statuses(
        order.display_financial_status,
        order.display_fulfillment_status,
    );
    let payment_method = payment_method_from_gateways(&order.payment_gateway_names);

    let items: Vec<MigrationOrderItem> = order
        .line_items
        .into_nodes()
        .into_iter()
        .map(|item| MigrationOrderItem {
            product_source_id: item.product.map(|p| gid_tail(&p.id).to_string()),
            title: item.title,
            quantity: item.quantity,
            price: item
                .original_unit_price_set
                .as_ref()
                .and_then(money_bag_amount)
                .unwrap_or(Decimal::ZERO),
        })
        .collect();

    let line_total: Decimal = items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum();

    let subtotal = order
        .subtotal_price_set
        .as_ref()
        .and_then(money_bag_amount)
        .unwrap_or(line_total);
    let shipping = order
        .total_shipping_price_set
        .as_ref()
        .and_then(money_bag_amount)
        .unwrap_or(Decimal::ZERO);
    let total = order
        .total_price_set
        .as_ref()
        .and_then(money_bag_amount)
        .unwrap_or(subtotal + shipping);

    MigrationOrder {
        source_id,
        order_number,
        customer_source_id: order.customer.map(|c| gid_tail(&c.id).to_string()),
        email: order.email.filter(|e| !e.is_empty()),
        items,
        subtotal,
        shipping,
        total,
        payment_status,
        order_status,
        payment_method,
        placed_at: order.processed_at,
    }
}

/// Maps Shopify's financial/fulfillment status pair onto the reduced
/// internal pair. Refunded and voided financial statuses dominate whatever
/// the fulfillment status says.
#[must_use]
pub fn map_order_statuses(
    financial: Option<FinancialStatus>,
    fulfillment: FulfillmentStatus,
) -> (PaymentStatus, OrderStatus) {
    match financial {
        Some(FinancialStatus::Refunded | FinancialStatus::PartiallyRefunded) => {
            (PaymentStatus::Refunded, OrderStatus::Refunded)
        }
        Some(FinancialStatus::Voided) => (PaymentStatus::Failed, OrderStatus::Cancelled),
        other => {
            let payment = match other {
                Some(FinancialStatus::Paid) => PaymentStatus::Paid,
                _ => PaymentStatus::Pending,
            };
            let order = match fulfillment {
                FulfillmentStatus::Fulfilled => OrderStatus::Delivered,
                FulfillmentStatus::PartiallyFulfilled => OrderStatus::Processing,
                FulfillmentStatus::Unfulfilled | FulfillmentStatus::Unknown => {
                    OrderStatus::Confirmed
                }
            };
            (payment, order)
        }
    }
}

/// Infers the payment method from gateway names: any gateway containing
/// `razorpay` maps to Razorpay, everything else to cash-on-delivery.
#[must_use]
pub fn payment_method_from_gateways(gateways: &[String]) -> PaymentMethod {
    if gateways
        .iter()
        .any(|g| g.to_lowercase().contains("razorpay"))
    {
        PaymentMethod::Razorpay
    } else {
        PaymentMethod::Cod
    }
}

// ---------------------------------------------------------------------------
// Coupons
// ---------------------------------------------------------------------------

/// Normalizes a discount node, or `None` for anything that is not a plain
/// code discount: automatic discounts, buy-X-get-Y promotions, and nodes
/// without a code.
#[must_use]
pub fn coupon(node: ShopifyDiscountNode) -> Option<MigrationCoupon> {
    let source_id = gid_tail(&node.id).to_string();

    match node.code_discount {
        ShopifyDiscount::DiscountCodeBasic {
            codes,
            customer_gets,
            minimum_requirement,
            usage_limit,
            ends_at,
        } => {
            let code = first_code(codes)?;
            let (discount_type, discount_value) = discount_value(customer_gets)?;
            Some(MigrationCoupon {
                source_id,
                code,
                discount_type,
                discount_value,
                min_purchase: minimum_subtotal(minimum_requirement),
                usage_limit,
                expires_at: ends_at,
            })
        }
        ShopifyDiscount::DiscountCodeFreeShipping {
            codes,
            minimum_requirement,
            usage_limit,
            ends_at,
        } => {
            let code = first_code(codes)?;
            Some(MigrationCoupon {
                source_id,
                code,
                discount_type: DiscountKind::FreeShipping,
                discount_value: Decimal::ZERO,
                min_purchase: minimum_subtotal(minimum_requirement),
                usage_limit,
                expires_at: ends_at,
            })
        }
        ShopifyDiscount::DiscountCodeBxgy {}
        | ShopifyDiscount::DiscountAutomaticBasic {}
        | ShopifyDiscount::DiscountAutomaticFreeShipping {}
        | ShopifyDiscount::DiscountAutomaticBxgy {}
        | ShopifyDiscount::DiscountAutomaticApp {}
        | ShopifyDiscount::Unknown => None,
    }
}

fn discount_value(customer_gets: CustomerGets) -> Option<(DiscountKind, Decimal)> {
    match customer_gets.value {
        DiscountValue::DiscountPercentage { percentage } => {
            // Shopify stores the fraction (0.15 == 15%); the internal model
            // uses a 0-100 scale.
            let percent = (Decimal::from_f64(percentage)? * Decimal::new(100, 0)).normalize();
            Some((DiscountKind::Percentage, percent))
        }
        DiscountValue::DiscountAmount { amount } => {
            Some((DiscountKind::FixedAmount, parse_money(&amount.amount)?))
        }
        DiscountValue::Unknown => None,
    }
}

fn minimum_subtotal(requirement: Option<MinimumRequirement>) -> Option<Decimal> {
    match requirement? {
        MinimumRequirement::DiscountMinimumSubtotal {
            greater_than_or_equal_to_subtotal,
        } => parse_money(&greater_than_or_equal_to_subtotal.amount),
        MinimumRequirement::DiscountMinimumQuantity {} | MinimumRequirement::Unknown => None,
    }
}

fn first_code(codes: Connection<DiscountCode>) -> Option<String> {
    codes
        .into_nodes()
        .into_iter()
        .next()
        .map(|node| node.code)
        .filter(|code| !code.is_empty())
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Extracts the trailing numeric id from a GID like
/// `gid://shopify/Product/123`. Non-GID input is returned unchanged.
#[must_use]
pub fn gid_tail(gid: &str) -> &str {
    gid.rsplit('/').next().unwrap_or(gid)
}

fn parse_money(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok()
}

fn money_bag_amount(bag: &MoneyBag) -> Option<Decimal> {
    parse_money(&bag.shop_money.amount)
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod tests;
