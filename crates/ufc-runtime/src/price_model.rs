//! Price models consulted by projection years.

use crate::features::{is_known_feature, BalanceFeatures};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ufc_core::PriceSignal;
use ufc_scenario::ConfigurationError;

/// Lowest price a fitted equation may return, in USD per lb or per SWU.
pub const MIN_MODEL_PRICE: f64 = 0.01;

/// Maps a year's balance features to a price pair.
///
/// Implementations must be pure: the same features always give the same
/// price. `Sync` lets scenarios run in parallel against one model.
pub trait PriceModel: Sync {
    fn price(&self, year: i32, features: &BalanceFeatures) -> PriceSignal;
}

impl<F> PriceModel for F
where
    F: Fn(i32, &BalanceFeatures) -> PriceSignal + Sync,
{
    fn price(&self, year: i32, features: &BalanceFeatures) -> PriceSignal {
        self(year, features)
    }
}

/// The same price every year.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantPrice(pub PriceSignal);

impl PriceModel for ConstantPrice {
    fn price(&self, _year: i32, _features: &BalanceFeatures) -> PriceSignal {
        self.0
    }
}

/// One fitted linear equation.
///
/// Coefficient keys are feature names, or `a:b` for the product of two
/// features. With `log_target` the linear predictor is the log price.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PriceEquation {
    pub intercept: f64,
    #[serde(default)]
    pub coefficients: BTreeMap<String, f64>,
    #[serde(default)]
    pub log_target: bool,
}

impl PriceEquation {
    fn terms(&self) -> impl Iterator<Item = &str> {
        self.coefficients.keys().flat_map(|k| k.split(':'))
    }

    /// Evaluate the equation; undefined features contribute zero.
    pub fn evaluate(&self, features: &BalanceFeatures) -> f64 {
        let mut y = self.intercept;
        for (term, coef) in &self.coefficients {
            let x: f64 = term
                .split(':')
                .map(|name| features.get(name).unwrap_or(0.0))
                .product();
            y += coef * x;
        }
        let price = if self.log_target { y.exp() } else { y };
        if price.is_finite() {
            price.max(MIN_MODEL_PRICE)
        } else {
            MIN_MODEL_PRICE
        }
    }
}

/// Two fitted equations, one per commodity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RegressionPriceModel {
    pub u3o8: PriceEquation,
    pub swu: PriceEquation,
}

fn to_decimal(v: f64) -> Decimal {
    Decimal::from_f64(v)
        .map(|d| d.round_dp(4))
        .unwrap_or(Decimal::ONE)
}

impl RegressionPriceModel {
    /// Build a model, rejecting coefficients on features that do not exist.
    /// `regimes` are the configured regime names.
    pub fn new<'a>(
        u3o8: PriceEquation,
        swu: PriceEquation,
        regimes: impl Iterator<Item = &'a str> + Clone,
    ) -> Result<Self, ConfigurationError> {
        for (label, eq) in [("u3o8", &u3o8), ("swu", &swu)] {
            for name in eq.terms() {
                if !is_known_feature(name, regimes.clone()) {
                    return Err(ConfigurationError::Invalid(format!(
                        "{label} price equation references unknown feature {name}"
                    )));
                }
            }
            if !eq.intercept.is_finite() || eq.coefficients.values().any(|c| !c.is_finite()) {
                return Err(ConfigurationError::Invalid(format!(
                    "{label} price equation has non-finite coefficients"
                )));
            }
        }
        Ok(Self { u3o8, swu })
    }

    /// Parse a YAML model and check it against the configured regimes.
    pub fn from_yaml_str<'a>(
        text: &str,
        regimes: impl Iterator<Item = &'a str> + Clone,
    ) -> Result<Self, ConfigurationError> {
        let raw: RegressionPriceModel = serde_yaml::from_str(text)?;
        Self::new(raw.u3o8, raw.swu, regimes)
    }
}

impl PriceModel for RegressionPriceModel {
    fn price(&self, _year: i32, features: &BalanceFeatures) -> PriceSignal {
        PriceSignal {
            u3o8_usd_per_lb: to_decimal(self.u3o8.evaluate(features)),
            swu_usd_per_swu: to_decimal(self.swu.evaluate(features)),
        }
    }
}
