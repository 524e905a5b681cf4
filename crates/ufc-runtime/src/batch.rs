//! Parallel runs of many scenarios against one baseline.

use crate::price_model::PriceModel;
use crate::simulator::{run_scenario, BalancePanel};
use crate::RunError;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::info;
use ufc_core::{InputSet, SimConfig};
use ufc_scenario::ScenarioSet;

/// Run every scenario of `scenarios` in parallel.
///
/// The baseline is shared read-only; each run owns its effective inputs and
/// state, so results match sequential runs exactly. A failing scenario does
/// not stop the others.
pub fn run_batch(
    baseline: &InputSet,
    scenarios: &ScenarioSet,
    config: &SimConfig,
    model: Option<&dyn PriceModel>,
) -> BTreeMap<String, Result<BalancePanel, RunError>> {
    info!(scenarios = scenarios.scenarios.len(), "batch started");
    scenarios
        .scenarios
        .par_iter()
        .map(|(name, scenario)| {
            let result = run_scenario(baseline, name, scenario, config, model);
            (name.clone(), result)
        })
        .collect()
}
