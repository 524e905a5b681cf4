//! Product/feed/SWU conversion at fixed assays.

use crate::EnrichError;
use serde::{Deserialize, Serialize};
use ufc_core::FuelCycleQuantities;

/// Assay triple for one enrichment operation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Assays {
    pub product: f64,
    pub feed: f64,
    pub tails: f64,
}

impl Assays {
    pub fn new(product: f64, feed: f64, tails: f64) -> Result<Self, EnrichError> {
        check_assays(product, feed, tails)?;
        Ok(Self {
            product,
            feed,
            tails,
        })
    }
}

/// Standard enrichment value function V(x) = (2x - 1) ln(x / (1 - x)).
///
/// Example:
/// let v = value_function(0.5);
/// assert_eq!(v, 0.0);
pub fn value_function(x: f64) -> f64 {
    (2.0 * x - 1.0) * (x / (1.0 - x)).ln()
}

/// Reject physically impossible assay triples.
pub fn check_assays(product: f64, feed: f64, tails: f64) -> Result<(), EnrichError> {
    let in_unit = |x: f64| x.is_finite() && x > 0.0 && x < 1.0;
    if !(in_unit(product) && in_unit(feed) && in_unit(tails)) || feed <= tails || product <= feed
    {
        return Err(EnrichError::InvalidAssay {
            product,
            feed,
            tails,
        });
    }
    Ok(())
}

/// Feed required per unit of product, from the U-235 mass balance.
pub fn feed_per_product(a: &Assays) -> f64 {
    (a.product - a.tails) / (a.feed - a.tails)
}

/// Separative work per unit of product.
pub fn swu_per_product(a: &Assays) -> f64 {
    let f = feed_per_product(a);
    value_function(a.product) + (f - 1.0) * value_function(a.tails) - f * value_function(a.feed)
}

fn check_quantity(q: f64) -> Result<(), EnrichError> {
    if !q.is_finite() || q < 0.0 {
        return Err(EnrichError::InvalidQuantity(q));
    }
    Ok(())
}

/// Feed and SWU needed to make `product_tu` of enriched product.
///
/// Example:
/// let a = Assays::new(0.044, 0.0071, 0.003).unwrap();
/// let q = feed_and_swu(1000.0, &a).unwrap();
/// // q.feed_tu == 10_000, q.swu ~= 6_045.6
pub fn feed_and_swu(product_tu: f64, a: &Assays) -> Result<FuelCycleQuantities, EnrichError> {
    check_assays(a.product, a.feed, a.tails)?;
    check_quantity(product_tu)?;
    Ok(FuelCycleQuantities {
        product_tu,
        feed_tu: product_tu * feed_per_product(a),
        swu: product_tu * swu_per_product(a),
        tails_assay: a.tails,
    })
}

/// Product obtainable from `feed_tu` of feed.
pub fn product_from_feed(feed_tu: f64, a: &Assays) -> Result<f64, EnrichError> {
    check_assays(a.product, a.feed, a.tails)?;
    check_quantity(feed_tu)?;
    Ok(feed_tu / feed_per_product(a))
}

/// Product obtainable from a separative work budget.
pub fn product_from_swu(swu: f64, a: &Assays) -> Result<f64, EnrichError> {
    check_assays(a.product, a.feed, a.tails)?;
    check_quantity(swu)?;
    Ok(swu / swu_per_product(a))
}
