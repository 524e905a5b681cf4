//! Simulation configuration with serde defaults.

use crate::{validate_price, PriceSignal, ValidationError, NATURAL_U235_ASSAY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bounded search for the cost-minimising tails assay.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TailsSearch {
    /// Lowest admissible tails assay.
    pub min_tails: f64,
    /// Highest admissible tails assay as a fraction of the feed assay.
    pub max_fraction_of_feed: f64,
    /// Relative tolerance on the bracket width.
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for TailsSearch {
    fn default() -> Self {
        Self {
            min_tails: 1.0e-4,
            max_fraction_of_feed: 0.999,
            tolerance: 1.0e-6,
            max_iterations: 100,
        }
    }
}

/// Price-feedback fixed point settings for projection years.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FixedPointConfig {
    /// Relative change in net balance accepted as converged.
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for FixedPointConfig {
    fn default() -> Self {
        Self {
            tolerance: 1.0e-4,
            max_iterations: 20,
        }
    }
}

/// Clamp applied to observed-over-nameplate generation ratios.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationRatioBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for GenerationRatioBounds {
    fn default() -> Self {
        Self { min: 0.0, max: 1.2 }
    }
}

/// Capacity used for the headline tightness ratio.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TightnessBasis {
    Conversion,
    Enrichment,
    /// The tighter of conversion and enrichment.
    #[default]
    Binding,
}

/// Inclusive year window flagging a market regime.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegimeWindow {
    pub start: i32,
    #[serde(default)]
    pub end: Option<i32>,
}

impl RegimeWindow {
    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && self.end.map_or(true, |e| year <= e)
    }
}

/// Simulation configuration parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// U-235 assay of the enrichment feed.
    pub feed_assay: f64,
    pub tails_search: TailsSearch,
    pub fixed_point: FixedPointConfig,
    pub generation_ratio: GenerationRatioBounds,
    pub tightness_basis: TightnessBasis,
    /// Optimise tails against observed prices in reconstruction years instead
    /// of taking them from data.
    pub optimize_historical_tails: bool,
    /// Price assumed before the first projection year when no observed price
    /// precedes it.
    pub initial_price: Option<PriceSignal>,
    /// Named regime windows emitted as indicator features.
    pub regimes: BTreeMap<String, RegimeWindow>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            feed_assay: NATURAL_U235_ASSAY,
            tails_search: TailsSearch::default(),
            fixed_point: FixedPointConfig::default(),
            generation_ratio: GenerationRatioBounds::default(),
            tightness_basis: TightnessBasis::default(),
            optimize_historical_tails: false,
            initial_price: None,
            regimes: BTreeMap::new(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> ValidationError {
    ValidationError::InvalidConfig(msg.into())
}

/// Validate configuration ranges.
pub fn validate_config(c: &SimConfig) -> Result<(), ValidationError> {
    if !(c.feed_assay.is_finite() && c.feed_assay > 0.0 && c.feed_assay < 1.0) {
        return Err(ValidationError::AssayOutOfRange {
            entity: "config feed_assay".into(),
            assay: c.feed_assay,
        });
    }
    let ts = &c.tails_search;
    if !(ts.min_tails > 0.0 && ts.min_tails < c.feed_assay) {
        return Err(invalid("tails_search.min_tails must lie in (0, feed_assay)"));
    }
    if !(ts.max_fraction_of_feed > 0.0 && ts.max_fraction_of_feed < 1.0)
        || ts.max_fraction_of_feed * c.feed_assay <= ts.min_tails
    {
        return Err(invalid("tails_search.max_fraction_of_feed leaves an empty interval"));
    }
    if !(ts.tolerance.is_finite() && ts.tolerance > 0.0) || ts.max_iterations == 0 {
        return Err(invalid("tails_search needs a positive tolerance and iteration cap"));
    }
    let fp = &c.fixed_point;
    if !(fp.tolerance.is_finite() && fp.tolerance > 0.0) || fp.max_iterations == 0 {
        return Err(invalid("fixed_point needs a positive tolerance and iteration cap"));
    }
    let g = &c.generation_ratio;
    if !(g.min.is_finite() && g.max.is_finite() && g.min >= 0.0 && g.max >= g.min) {
        return Err(invalid("generation_ratio bounds must satisfy 0 <= min <= max"));
    }
    if let Some(p) = &c.initial_price {
        validate_price("config initial_price", p)?;
    }
    for (name, w) in &c.regimes {
        if let Some(e) = w.end {
            if e < w.start {
                return Err(invalid(format!("regime {name} ends before it starts")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        validate_config(&SimConfig::default()).unwrap();
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let text = "fixed_point:\n  max_iterations: 5\ntightness_basis: enrichment\nregimes:\n  post_fukushima:\n    start: 2011\n    end: 2020\n";
        let c: SimConfig = serde_yaml::from_str(text).unwrap();
        assert_eq!(c.fixed_point.max_iterations, 5);
        assert_eq!(c.fixed_point.tolerance, 1.0e-4);
        assert_eq!(c.tails_search.max_iterations, 100);
        assert_eq!(c.tightness_basis, TightnessBasis::Enrichment);
        assert!(c.regimes["post_fukushima"].contains(2015));
        assert!(!c.regimes["post_fukushima"].contains(2021));
        validate_config(&c).unwrap();
    }

    #[test]
    fn empty_search_interval_is_rejected() {
        let mut c = SimConfig::default();
        c.tails_search.min_tails = 0.008;
        assert!(validate_config(&c).is_err());
    }
}
