//! Normalization from Etsy listing shapes to the internal migration records.
//! Pure functions, no I/O. Listings outside the `active`/`draft` states
//! return `None` and are dropped by the caller.
//!
//! Etsy has no true variant objects; variants are synthesized from the
//! listing's property dimensions — one variant per value for a single
//! dimension, or the cross-product of the first two dimensions — with the
//! listing quantity split evenly by integer floor division.

use std::collections::BTreeMap;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use storeforge_core::{
    MigrationCollection, MigrationImage, MigrationProduct, MigrationVariant, ProductStatus,
};

use crate::types::{EtsyListing, EtsyMoney, EtsyPropertyValue, EtsyShopSection};

/// Normalizes a listing, or `None` when it should be skipped: states other
/// than `active`/`draft`, or a malformed price.
#[must_use]
pub fn listing(listing: EtsyListing, target_status: ProductStatus) -> Option<MigrationProduct> {
    if !matches!(listing.state.as_str(), "active" | "draft") {
        return None;
    }

    let price = money(&listing.price)?;
    let quantity = listing.quantity.max(0);
    let weight_grams = weight_to_grams(listing.item_weight, listing.item_weight_unit.as_deref());

    let variants = synthesize_variants(
        &listing.property_values,
        quantity,
        price,
        weight_grams,
    );

    let images = listing
        .images
        .iter()
        .enumerate()
        .map(|(idx, image)| MigrationImage {
            url: image.url_fullxfull.clone(),
            position: i32::try_from(idx).unwrap_or(i32::MAX - 1) + 1,
        })
        .collect();

    Some(MigrationProduct {
        source_id: listing.listing_id.to_string(),
        title: listing.title,
        description: listing.description.filter(|d| !d.trim().is_empty()),
        price,
        compare_at_price: None,
        sku: listing.skus.into_iter().next().filter(|s| !s.is_empty()),
        quantity,
        track_quantity: true,
        weight_grams,
        requires_shipping: true,
        categories: listing.taxonomy_path.last().cloned().into_iter().collect(),
        tags: listing.tags,
        status: target_status,
        featured: false,
        variants,
        images,
    })
}

/// Builds a collection from a shop section and its (separately fetched)
/// member listing ids.
#[must_use]
pub fn section(section: EtsyShopSection, listing_ids: &[i64]) -> MigrationCollection {
    MigrationCollection {
        source_id: section.shop_section_id.to_string(),
        name: section.title,
        description: None,
        product_source_ids: listing_ids.iter().map(ToString::to_string).collect(),
    }
}

/// Converts `{amount, divisor}` money to a decimal value.
fn money(money: &EtsyMoney) -> Option<Decimal> {
    if money.divisor <= 0 {
        return None;
    }
    Some((Decimal::from(money.amount) / Decimal::from(money.divisor)).normalize())
}

/// Converts a listing weight into grams. Zero or absent weights yield `None`;
/// unknown units are treated as grams.
#[must_use]
pub fn weight_to_grams(weight: Option<f64>, unit: Option<&str>) -> Option<Decimal> {
    let value = weight.filter(|w| *w > 0.0)?;
    let value = Decimal::from_f64(value)?;

    let factor = match unit {
        Some("kg") => Decimal::new(1000, 0),
        Some("lb") => Decimal::new(453_592, 3),
        Some("oz") => Decimal::new(283_495, 4),
        _ => Decimal::ONE,
    };

    Some((value * factor).normalize())
}

/// Synthesizes variants from property dimensions.
///
/// Quantity is split evenly across synthesized variants via integer floor
/// division and never goes negative. Listings with no usable dimensions get
/// no variants — the product-level fields carry everything.
fn synthesize_variants(
    property_values: &[EtsyPropertyValue],
    quantity: i32,
    price: Decimal,
    weight_grams: Option<Decimal>,
) -> Vec<MigrationVariant> {
    let dimensions: Vec<(&str, &[String])> = property_values
        .iter()
        .filter_map(|property| {
            let name = property.property_name.as_deref()?;
            if property.values.is_empty() {
                None
            } else {
                Some((name, property.values.as_slice()))
            }
        })
        .collect();

    let make = |title: String, options: BTreeMap<String, String>, share: i32| MigrationVariant {
        source_id: None,
        title,
        sku: None,
        price,
        compare_at_price: None,
        quantity: share,
        options,
        weight_grams,
    };

    match dimensions.as_slice() {
        [] => Vec::new(),
        [(name, values)] => {
            let share = per_variant_quantity(quantity, values.len());
            values
                .iter()
                .map(|value| {
                    let options =
                        BTreeMap::from([((*name).to_string(), value.clone())]);
                    make(value.clone(), options, share)
                })
                .collect()
        }
        // Cross-product of the first two dimensions only; deeper option
        // spaces are not representable on Etsy's side either.
        [(first_name, first_values), (second_name, second_values), ..] => {
            let combinations = first_values.len() * second_values.len();
            let share = per_variant_quantity(quantity, combinations);
            first_values
                .iter()
                .flat_map(|first| {
                    second_values.iter().map(move |second| (first, second))
                })
                .map(|(first, second)| {
                    let options = BTreeMap::from([
                        ((*first_name).to_string(), first.clone()),
                        ((*second_name).to_string(), second.clone()),
                    ]);
                    make(format!("{first} / {second}"), options, share)
                })
                .collect()
        }
    }
}

fn per_variant_quantity(total: i32, variant_count: usize) -> i32 {
    let count = i32::try_from(variant_count).unwrap_or(i32::MAX).max(1);
    (total / count).max(0)
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod tests;
