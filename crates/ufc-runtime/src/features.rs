//! Per-year balance features: the input of price models and the emitted
//! regression panel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ufc_core::{BalanceRecord, RegimeWindow};

/// Numeric feature names understood by [`BalanceFeatures::get`], besides the
/// configured regime names.
pub const FEATURE_NAMES: &[&str] = &[
    "feed_tu",
    "swu",
    "primary_supply_tu",
    "secondary_supply_tu",
    "total_supply_tu",
    "net_balance_tu",
    "balance_ratio",
    "inventory_tu",
    "inventory_years",
    "secondary_share",
    "conversion_tightness",
    "enrichment_tightness",
    "capacity_tightness",
];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BalanceFeatures {
    pub year: i32,
    pub feed_tu: f64,
    pub swu: f64,
    pub primary_supply_tu: f64,
    pub secondary_supply_tu: f64,
    pub total_supply_tu: f64,
    pub net_balance_tu: f64,
    pub balance_ratio: Option<f64>,
    pub inventory_tu: f64,
    pub inventory_years: Option<f64>,
    /// Secondary over total supply.
    pub secondary_share: Option<f64>,
    pub conversion_tightness: Option<f64>,
    pub enrichment_tightness: Option<f64>,
    pub capacity_tightness: Option<f64>,
    /// Regime indicator flags by regime name.
    pub regimes: BTreeMap<String, bool>,
}

impl BalanceFeatures {
    pub fn from_record(record: &BalanceRecord, regimes: &BTreeMap<String, RegimeWindow>) -> Self {
        let secondary_share = if record.total_supply_tu > 0.0 {
            Some(record.secondary_supply_tu / record.total_supply_tu)
        } else {
            None
        };
        Self {
            year: record.year,
            feed_tu: record.feed_tu,
            swu: record.swu,
            primary_supply_tu: record.primary_supply_tu,
            secondary_supply_tu: record.secondary_supply_tu,
            total_supply_tu: record.total_supply_tu,
            net_balance_tu: record.net_balance_tu,
            balance_ratio: record.balance_ratio,
            inventory_tu: record.inventory_tu,
            inventory_years: record.inventory_years,
            secondary_share,
            conversion_tightness: record.conversion_tightness,
            enrichment_tightness: record.enrichment_tightness,
            capacity_tightness: record.capacity_tightness,
            regimes: regimes
                .iter()
                .map(|(name, w)| (name.clone(), w.contains(record.year)))
                .collect(),
        }
    }

    /// Feature value by name. Regime flags read as 1.0 / 0.0; ratios that are
    /// undefined for the year (zero denominator) read as `None`.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "feed_tu" => Some(self.feed_tu),
            "swu" => Some(self.swu),
            "primary_supply_tu" => Some(self.primary_supply_tu),
            "secondary_supply_tu" => Some(self.secondary_supply_tu),
            "total_supply_tu" => Some(self.total_supply_tu),
            "net_balance_tu" => Some(self.net_balance_tu),
            "balance_ratio" => self.balance_ratio,
            "inventory_tu" => Some(self.inventory_tu),
            "inventory_years" => self.inventory_years,
            "secondary_share" => self.secondary_share,
            "conversion_tightness" => self.conversion_tightness,
            "enrichment_tightness" => self.enrichment_tightness,
            "capacity_tightness" => self.capacity_tightness,
            other => self
                .regimes
                .get(other)
                .map(|on| if *on { 1.0 } else { 0.0 }),
        }
    }
}

/// Whether `name` is a feature a model may reference.
pub fn is_known_feature<'a>(name: &str, mut regimes: impl Iterator<Item = &'a str>) -> bool {
    FEATURE_NAMES.contains(&name) || regimes.any(|r| r == name)
}
