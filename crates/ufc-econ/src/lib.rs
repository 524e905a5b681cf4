#![deny(warnings)]

//! Enrichment economics for the fuel-cycle balance engine.
//!
//! This crate provides validated utilities for:
//! - Converting enriched product into natural feed and separative work
//! - Inverting those conversions from a feed or SWU budget
//! - Choosing the cost-minimising tails assay against a price signal

use thiserror::Error;

pub mod enrichment;
pub mod tails;

pub use enrichment::{
    check_assays, feed_and_swu, feed_per_product, product_from_feed, product_from_swu,
    swu_per_product, value_function, Assays,
};
pub use tails::{optimize_tails, resolve_tails, unit_cost, TailsOptimum, TailsPolicy};

/// Errors produced by enrichment helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EnrichError {
    /// Assays must lie in (0, 1) with tails < feed < product.
    #[error("invalid assays: product {product}, feed {feed}, tails {tails}")]
    InvalidAssay { product: f64, feed: f64, tails: f64 },
    /// Quantities must be finite and non-negative.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(f64),
    /// Prices must be finite and > 0.
    #[error("invalid price signal")]
    InvalidPrice,
    /// Tails search hit its iteration cap before the bracket met tolerance.
    #[error("tails search did not converge after {iterations} iterations (bracket width {width})")]
    Convergence { iterations: u32, width: f64 },
}
