//! Tests for the Shopify transformers. Wire values are built from JSON
//! fixtures so the serde layer is exercised along the way.

use rust_decimal::Decimal;
use serde_json::json;

use storeforge_core::{DiscountKind, OrderStatus, PaymentMethod, PaymentStatus, ProductStatus};

use super::*;

fn product_from_json(value: serde_json::Value) -> ShopifyProduct {
    serde_json::from_value(value).expect("valid product fixture")
}

fn base_product_json() -> serde_json::Value {
    json!({
        "id": "gid://shopify/Product/111",
        "title": "Ceramic Mug",
        "descriptionHtml": "<p>A &amp; B <strong>mug</strong></p>",
        "status": "ACTIVE",
        "productType": "Kitchen",
        "tags": ["ceramic", "mug"],
        "variants": { "edges": [
            { "node": {
                "id": "gid://shopify/ProductVariant/201",
                "title": "Small / Blue",
                "sku": "MUG-S-BLU",
                "price": "14.50",
                "compareAtPrice": "19.00",
                "inventoryQuantity": 4,
                "selectedOptions": [
                    { "name": "Size", "value": "Small" },
                    { "name": "Color", "value": "Blue" }
                ],
                "weight": 0.3,
                "weightUnit": "KILOGRAMS",
                "requiresShipping": true
            }},
            { "node": {
                "id": "gid://shopify/ProductVariant/202",
                "title": "Large / Blue",
                "sku": "",
                "price": "16.50",
                "compareAtPrice": null,
                "inventoryQuantity": 3,
                "selectedOptions": [
                    { "name": "Size", "value": "Large" },
                    { "name": "Color", "value": "Blue" }
                ],
                "weight": 0.4,
                "weightUnit": "KILOGRAMS",
                "requiresShipping": true
            }}
        ]},
        "images": { "edges": [
            { "node": { "url": "https://cdn.shopify.com/mug-1.jpg" } },
            { "node": { "url": "https://cdn.shopify.com/mug-2.jpg" } }
        ]}
    })
}

// ---------------------------------------------------------------------------
// product
// ---------------------------------------------------------------------------

#[test]
fn product_maps_core_fields() {
    let normalized = product(product_from_json(base_product_json()), ProductStatus::Draft)
        .expect("active product imports");

    assert_eq!(normalized.source_id, "111");
    assert_eq!(normalized.title, "Ceramic Mug");
    assert_eq!(normalized.description.as_deref(), Some("A & B mug"));
    assert_eq!(normalized.price, Decimal::new(1450, 2));
    assert_eq!(normalized.compare_at_price, Some(Decimal::new(1900, 2)));
    assert_eq!(normalized.sku.as_deref(), Some("MUG-S-BLU"));
    assert_eq!(normalized.quantity, 7);
    assert_eq!(normalized.categories, vec!["Kitchen".to_string()]);
    assert_eq!(normalized.status, ProductStatus::Draft);
    assert!(normalized.requires_shipping);
}

#[test]
fn product_skips_archived() {
    let mut fixture = base_product_json();
    fixture["status"] = json!("ARCHIVED");
    assert!(product(product_from_json(fixture), ProductStatus::Draft).is_none());
}

#[test]
fn product_flattens_variant_options() {
    let normalized =
        product(product_from_json(base_product_json()), ProductStatus::Active).expect("imports");

    assert_eq!(normalized.variants.len(), 2);
    let small = &normalized.variants[0];
    assert_eq!(small.source_id.as_deref(), Some("201"));
    assert_eq!(small.options.get("Size").map(String::as_str), Some("Small"));
    assert_eq!(small.options.get("Color").map(String::as_str), Some("Blue"));
    // Empty SKU strings become absent.
    assert!(normalized.variants[1].sku.is_none());
}

#[test]
fn product_folds_default_title_variant_into_product() {
    let fixture = json!({
        "id": "gid://shopify/Product/5",
        "title": "Poster",
        "status": "ACTIVE",
        "variants": { "edges": [
            { "node": {
                "id": "gid://shopify/ProductVariant/50",
                "title": "Default Title",
                "price": "9.99",
                "inventoryQuantity": 12,
                "selectedOptions": [ { "name": "Title", "value": "Default Title" } ]
            }}
        ]},
        "images": { "edges": [] }
    });

    let normalized = product(product_from_json(fixture), ProductStatus::Draft).expect("imports");
    assert!(normalized.variants.is_empty());
    assert_eq!(normalized.price, Decimal::new(999, 2));
    assert_eq!(normalized.quantity, 12);
}

#[test]
fn product_images_get_one_based_positions() {
    let normalized =
        product(product_from_json(base_product_json()), ProductStatus::Draft).expect("imports");
    let positions: Vec<i32> = normalized.images.iter().map(|i| i.position).collect();
    assert_eq!(positions, vec![1, 2]);
}

#[test]
fn product_without_variants_is_skipped() {
    let fixture = json!({
        "id": "gid://shopify/Product/6",
        "title": "Ghost",
        "status": "ACTIVE",
        "variants": { "edges": [] },
        "images": { "edges": [] }
    });
    assert!(product(product_from_json(fixture), ProductStatus::Draft).is_none());
}

#[test]
fn product_with_unparseable_price_is_skipped() {
    let mut fixture = base_product_json();
    fixture["variants"]["edges"][0]["node"]["price"] = json!("not-a-price");
    assert!(product(product_from_json(fixture), ProductStatus::Draft).is_none());
}

// ---------------------------------------------------------------------------
// weight conversion
// ---------------------------------------------------------------------------

#[test]
fn weight_kilograms_to_grams() {
    assert_eq!(
        weight_to_grams(Some(2.0), Some(ShopifyWeightUnit::Kilograms)),
        Some(Decimal::new(2000, 0))
    );
}

#[test]
fn weight_pounds_to_grams() {
    assert_eq!(
        weight_to_grams(Some(1.0), Some(ShopifyWeightUnit::Pounds)),
        Some(Decimal::new(453_592, 3))
    );
}

#[test]
fn weight_ounces_to_grams() {
    assert_eq!(
        weight_to_grams(Some(2.0), Some(ShopifyWeightUnit::Ounces)),
        Some(Decimal::new(56_699, 3))
    );
}

#[test]
fn weight_zero_is_absent() {
    assert_eq!(weight_to_grams(Some(0.0), Some(ShopifyWeightUnit::Kilograms)), None);
    assert_eq!(weight_to_grams(None, Some(ShopifyWeightUnit::Grams)), None);
}

// ---------------------------------------------------------------------------
// strip_html
// ---------------------------------------------------------------------------

#[test]
fn strip_html_removes_tags_and_unescapes_entities() {
    assert_eq!(
        strip_html("<p>Tom &amp; Jerry&#39;s&nbsp;<em>mug</em></p>").as_deref(),
        Some("Tom & Jerry's mug")
    );
}

#[test]
fn strip_html_collapses_whitespace_across_block_tags() {
    assert_eq!(
        strip_html("<div>line one</div>\n<div>line two</div>").as_deref(),
        Some("line one line two")
    );
}

#[test]
fn strip_html_of_pure_markup_is_none() {
    assert!(strip_html("<p></p><br/>").is_none());
}

// ---------------------------------------------------------------------------
// customers
// ---------------------------------------------------------------------------

fn customer_from_json(value: serde_json::Value) -> ShopifyCustomer {
    serde_json::from_value(value).expect("valid customer fixture")
}

#[test]
fn customer_without_email_is_skipped() {
    let fixture = json!({
        "id": "gid://shopify/Customer/9",
        "firstName": "Ada",
        "email": null
    });
    assert!(customer(customer_from_json(fixture)).is_none());
}

#[test]
fn customer_name_prefers_first_and_last() {
    let fixture = json!({
        "id": "gid://shopify/Customer/9",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com"
    });
    let normalized = customer(customer_from_json(fixture)).expect("imports");
    assert_eq!(normalized.name, "Ada Lovelace");
    assert_eq!(normalized.source_id, "9");
}

#[test]
fn customer_name_falls_back_to_email_local_part() {
    let fixture = json!({
        "id": "gid://shopify/Customer/10",
        "email": "grace.hopper@example.com"
    });
    let normalized = customer(customer_from_json(fixture)).expect("imports");
    assert_eq!(normalized.name, "grace.hopper");
}

#[test]
fn customer_default_address_is_flagged() {
    let fixture = json!({
        "id": "gid://shopify/Customer/11",
        "email": "a@example.com",
        "addresses": [
            { "address1": "1 First St", "city": "Pune", "zip": "411001" },
            { "address1": "2 Second St", "city": "Pune", "zip": "411002" }
        ],
        "defaultAddress": { "address1": "2 Second St", "city": "Pune", "zip": "411002" }
    });
    let normalized = customer(customer_from_json(fixture)).expect("imports");
    assert_eq!(normalized.addresses.len(), 2);
    assert!(!normalized.addresses[0].is_default);
    assert!(normalized.addresses[1].is_default);
}

#[test]
fn customer_subscribed_marketing_state_maps_to_accepts_marketing() {
    let fixture = json!({
        "id": "gid://shopify/Customer/12",
        "email": "a@example.com",
        "emailMarketingConsent": { "marketingState": "SUBSCRIBED" }
    });
    assert!(customer(customer_from_json(fixture)).expect("imports").accepts_marketing);
}

// ---------------------------------------------------------------------------
// orders
// ---------------------------------------------------------------------------

fn order_from_json(value: serde_json::Value) -> ShopifyOrder {
    serde_json::from_value(value).expect("valid order fixture")
}

fn base_order_json() -> serde_json::Value {
    json!({
        "id": "gid://shopify/Order/777",
        "name": "#1042",
        "email": "buyer@example.com",
        "displayFinancialStatus": "PAID",
        "displayFulfillmentStatus": "UNFULFILLED",
        "customer": { "id": "gid://shopify/Customer/9" },
        "paymentGatewayNames": ["Razorpay Secure"],
        "subtotalPriceSet": { "shopMoney": { "amount": "40.00" } },
        "totalShippingPriceSet": { "shopMoney": { "amount": "5.00" } },
        "totalPriceSet": { "shopMoney": { "amount": "45.00" } },
        "processedAt": "2024-03-01T10:00:00Z",
        "lineItems": { "edges": [
            { "node": {
                "title": "Ceramic Mug",
                "quantity": 2,
                "product": { "id": "gid://shopify/Product/111" },
                "originalUnitPriceSet": { "shopMoney": { "amount": "20.00" } }
            }}
        ]}
    })
}

#[test]
fn order_gets_imp_prefix_and_linking_ids() {
    let normalized = order(order_from_json(base_order_json()));
    assert_eq!(normalized.order_number, "IMP-1042");
    assert_eq!(normalized.source_id, "777");
    assert_eq!(normalized.customer_source_id.as_deref(), Some("9"));
    assert_eq!(
        normalized.items[0].product_source_id.as_deref(),
        Some("111")
    );
    assert_eq!(normalized.total, Decimal::new(4500, 2));
}

#[test]
fn order_paid_unfulfilled_is_confirmed() {
    let normalized = order(order_from_json(base_order_json()));
    assert_eq!(normalized.payment_status, PaymentStatus::Paid);
    assert_eq!(normalized.order_status, OrderStatus::Confirmed);
}

#[test]
fn order_refunded_dominates_fulfillment() {
    for fulfillment in ["UNFULFILLED", "PARTIALLY_FULFILLED", "FULFILLED"] {
        let mut fixture = base_order_json();
        fixture["displayFinancialStatus"] = json!("REFUNDED");
        fixture["displayFulfillmentStatus"] = json!(fulfillment);
        let normalized = order(order_from_json(fixture));
        assert_eq!(normalized.order_status, OrderStatus::Refunded, "{fulfillment}");
        assert_eq!(normalized.payment_status, PaymentStatus::Refunded);
    }
}

#[test]
fn order_voided_is_cancelled() {
    let mut fixture = base_order_json();
    fixture["displayFinancialStatus"] = json!("VOIDED");
    let normalized = order(order_from_json(fixture));
    assert_eq!(normalized.order_status, OrderStatus::Cancelled);
    assert_eq!(normalized.payment_status, PaymentStatus::Failed);
}

#[test]
fn order_fulfilled_is_delivered() {
    let mut fixture = base_order_json();
    fixture["displayFulfillmentStatus"] = json!("FULFILLED");
    assert_eq!(order(order_from_json(fixture)).order_status, OrderStatus::Delivered);
}

#[test]
fn payment_method_matches_gateway_substring() {
    assert_eq!(
        payment_method_from_gateways(&["Razorpay Secure".to_string()]),
        PaymentMethod::Razorpay
    );
    assert_eq!(
        payment_method_from_gateways(&["manual".to_string()]),
        PaymentMethod::Cod
    );
    assert_eq!(payment_method_from_gateways(&[]), PaymentMethod::Cod);
}

#[test]
fn order_subtotal_falls_back_to_line_items() {
    let mut fixture = base_order_json();
    fixture["subtotalPriceSet"] = json!(null);
    fixture["totalPriceSet"] = json!(null);
    let normalized = order(order_from_json(fixture));
    assert_eq!(normalized.subtotal, Decimal::new(4000, 2));
    assert_eq!(normalized.total, Decimal::new(4500, 2));
}

// ---------------------------------------------------------------------------
// coupons
// ---------------------------------------------------------------------------

fn discount_from_json(value: serde_json::Value) -> ShopifyDiscountNode {
    serde_json::from_value(value).expect("valid discount fixture")
}

#[test]
fn coupon_percentage_converts_fraction_to_percent_scale() {
    let fixture = json!({
        "id": "gid://shopify/DiscountCodeNode/31",
        "codeDiscount": {
            "__typename": "DiscountCodeBasic",
            "codes": { "edges": [ { "node": { "code": "SAVE15" } } ] },
            "customerGets": { "value": {
                "__typename": "DiscountPercentage",
                "percentage": 0.15
            }},
            "usageLimit": 100
        }
    });
    let normalized = coupon(discount_from_json(fixture)).expect("imports");
    assert_eq!(normalized.code, "SAVE15");
    assert_eq!(normalized.discount_type, DiscountKind::Percentage);
    assert_eq!(normalized.discount_value, Decimal::new(15, 0));
    assert_eq!(normalized.usage_limit, Some(100));
}

#[test]
fn coupon_fixed_amount_with_minimum_subtotal() {
    let fixture = json!({
        "id": "gid://shopify/DiscountCodeNode/32",
        "codeDiscount": {
            "__typename": "DiscountCodeBasic",
            "codes": { "edges": [ { "node": { "code": "FLAT100" } } ] },
            "customerGets": { "value": {
                "__typename": "DiscountAmount",
                "amount": { "amount": "100.00" }
            }},
            "minimumRequirement": {
                "__typename": "DiscountMinimumSubtotal",
                "greaterThanOrEqualToSubtotal": { "amount": "500.00" }
            }
        }
    });
    let normalized = coupon(discount_from_json(fixture)).expect("imports");
    assert_eq!(normalized.discount_type, DiscountKind::FixedAmount);
    assert_eq!(normalized.discount_value, Decimal::new(10000, 2));
    assert_eq!(normalized.min_purchase, Some(Decimal::new(50000, 2)));
}

#[test]
fn coupon_free_shipping_has_zero_value() {
    let fixture = json!({
        "id": "gid://shopify/DiscountCodeNode/33",
        "codeDiscount": {
            "__typename": "DiscountCodeFreeShipping",
            "codes": { "edges": [ { "node": { "code": "SHIP" } } ] }
        }
    });
    let normalized = coupon(discount_from_json(fixture)).expect("imports");
    assert_eq!(normalized.code, "SHIP");
    assert_eq!(normalized.discount_type, DiscountKind::FreeShipping);
    assert_eq!(normalized.discount_value, Decimal::ZERO);
}

#[test]
fn coupon_automatic_discount_is_skipped() {
    let fixture = json!({
        "id": "gid://shopify/DiscountAutomaticNode/34",
        "codeDiscount": { "__typename": "DiscountAutomaticBasic" }
    });
    assert!(coupon(discount_from_json(fixture)).is_none());
}

#[test]
fn coupon_bxgy_is_skipped() {
    let fixture = json!({
        "id": "gid://shopify/DiscountCodeNode/35",
        "codeDiscount": { "__typename": "DiscountCodeBxgy" }
    });
    assert!(coupon(discount_from_json(fixture)).is_none());
}

#[test]
fn coupon_without_code_is_skipped() {
    let fixture = json!({
        "id": "gid://shopify/DiscountCodeNode/36",
        "codeDiscount": {
            "__typename": "DiscountCodeBasic",
            "codes": { "edges": [] },
            "customerGets": { "value": {
                "__typename": "DiscountPercentage",
                "percentage": 0.10
            }}
        }
    });
    assert!(coupon(discount_from_json(fixture)).is_none());
}

// ---------------------------------------------------------------------------
// collections & helpers
// ---------------------------------------------------------------------------

#[test]
fn collection_maps_member_product_ids() {
    let fixture = json!({
        "id": "gid://shopify/Collection/21",
        "title": "Summer",
        "description": "Warm weather picks",
        "products": { "edges": [
            { "node": { "id": "gid://shopify/Product/111" } },
            { "node": { "id": "gid://shopify/Product/112" } }
        ]}
    });
    let raw: ShopifyCollection = serde_json::from_value(fixture).expect("fixture");
    let normalized = collection(raw);
    assert_eq!(normalized.source_id, "21");
    assert_eq!(normalized.product_source_ids, vec!["111", "112"]);
}

#[test]
fn gid_tail_extracts_numeric_id() {
    assert_eq!(gid_tail("gid://shopify/Product/123"), "123");
    assert_eq!(gid_tail("plain-id"), "plain-id");
}
