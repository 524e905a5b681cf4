//! Year-by-year balance simulation.
//!
//! Each year is computed from an explicit [`SimState`] and returns the next
//! one. Years with an observed price are reconstructed with tails from data;
//! other years, when a price model is supplied, are projected by a bounded
//! fixed point between the price model and the tails choice.

use crate::demand::{country_records, year_demand, YearDemand};
use crate::features::BalanceFeatures;
use crate::inventory::InventoryTracker;
use crate::price_model::PriceModel;
use crate::supply::{project_primary, project_secondary, PrimarySupply, SecondarySupply};
use crate::RunError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use ufc_core::{
    validate_config, validate_inputs, BalanceRecord, CountryDemandRecord, FuelCycleQuantities,
    InputSet, PriceSignal, ReactorType, ReactorTypeId, SimConfig, SimulationMode, TightnessBasis,
    ValidationError, YearStatus, DEFAULT_TAILS_ASSAY,
};
use ufc_econ::{feed_and_swu, optimize_tails, Assays, EnrichError};
use ufc_scenario::{ConfigurationError, Scenario, ScenarioEngine};

/// State carried from one year to the next.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SimState {
    pub last_year: Option<i32>,
    pub inventory: InventoryTracker,
    /// Price of the last observed or converged year.
    pub last_price: Option<PriceSignal>,
}

/// Everything one year produces.
#[derive(Clone, Debug, PartialEq)]
pub struct YearOutcome {
    pub record: BalanceRecord,
    pub country_demand: Vec<CountryDemandRecord>,
    pub features: BalanceFeatures,
}

/// Result of a full run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BalancePanel {
    pub scenario: String,
    /// One record per horizon year, in year order.
    pub records: Vec<BalanceRecord>,
    /// Sorted by (country, year).
    pub country_demand: Vec<CountryDemandRecord>,
    pub features: Vec<BalanceFeatures>,
}

impl BalancePanel {
    pub fn record(&self, year: i32) -> Option<&BalanceRecord> {
        self.records.iter().find(|r| r.year == year)
    }

    /// Years whose price fixed point did not converge.
    pub fn convergence_failures(&self) -> Vec<i32> {
        self.records
            .iter()
            .filter(|r| r.status.is_failure())
            .map(|r| r.year)
            .collect()
    }
}

// Year inputs that do not depend on the tails choice.
struct YearFrame {
    demand: YearDemand,
    primary: PrimarySupply,
    secondary: SecondarySupply,
    policy_flow_tu: f64,
}

#[derive(Clone)]
struct Evaluation {
    record: BalanceRecord,
    country_demand: Vec<CountryDemandRecord>,
    inventory: InventoryTracker,
}

pub struct BalanceSimulator<'a> {
    inputs: &'a InputSet,
    config: &'a SimConfig,
    model: Option<&'a dyn PriceModel>,
}

impl<'a> BalanceSimulator<'a> {
    /// Validate inputs and configuration; nothing is simulated on failure.
    pub fn new(inputs: &'a InputSet, config: &'a SimConfig) -> Result<Self, RunError> {
        validate_config(config)
            .map_err(|e| RunError::Configuration(ConfigurationError::Invalid(e.to_string())))?;
        validate_inputs(inputs)?;
        Ok(Self {
            inputs,
            config,
            model: None,
        })
    }

    /// Project years without an observed price against `model`.
    pub fn with_price_model(mut self, model: &'a dyn PriceModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn initial_state(&self) -> SimState {
        SimState {
            last_year: None,
            inventory: InventoryTracker::from_pools(&self.inputs.inventory_pools),
            last_price: None,
        }
    }

    /// Simulate the whole horizon.
    pub fn run(&self, scenario: &str) -> Result<BalancePanel, RunError> {
        let h = self.inputs.horizon;
        info!(
            scenario,
            start = h.start_year,
            end = h.end_year,
            projected = self.model.is_some(),
            "run started"
        );
        let mut state = self.initial_state();
        let mut records = Vec::new();
        let mut country_demand = Vec::new();
        let mut features = Vec::new();
        for year in h.years() {
            let (next, out) = self.step_year(state, year)?;
            state = next;
            records.push(out.record);
            country_demand.extend(out.country_demand);
            features.push(out.features);
        }
        country_demand.sort_by(|a, b| a.country.cmp(&b.country).then(a.year.cmp(&b.year)));

        let panel = BalancePanel {
            scenario: scenario.to_string(),
            records,
            country_demand,
            features,
        };
        info!(
            scenario,
            years = panel.records.len(),
            convergence_failures = panel.convergence_failures().len(),
            "run finished"
        );
        Ok(panel)
    }

    /// Compute `year` from `state`. Years must be inside the horizon and
    /// strictly increasing.
    pub fn step_year(&self, state: SimState, year: i32) -> Result<(SimState, YearOutcome), RunError> {
        if !self.inputs.horizon.contains(year) {
            return Err(RunError::OutsideHorizon(year));
        }
        if let Some(previous) = state.last_year {
            if year <= previous {
                return Err(RunError::YearOrder { year, previous });
            }
        }

        let frame = self.frame(year)?;
        let observed = self.inputs.observed_prices.get(&year).copied();
        let (eval, last_price) = match (observed, self.model) {
            (None, Some(model)) => self.project(&state, &frame, model)?,
            _ => self.reconstruct(&state, &frame, observed)?,
        };
        debug!(
            year,
            mode = ?eval.record.mode,
            feed_tu = eval.record.feed_tu,
            net_balance_tu = eval.record.net_balance_tu,
            "year simulated"
        );

        let features = BalanceFeatures::from_record(&eval.record, &self.config.regimes);
        let next = SimState {
            last_year: Some(year),
            inventory: eval.inventory,
            last_price,
        };
        Ok((
            next,
            YearOutcome {
                record: eval.record,
                country_demand: eval.country_demand,
                features,
            },
        ))
    }

    fn frame(&self, year: i32) -> Result<YearFrame, ValidationError> {
        Ok(YearFrame {
            demand: year_demand(self.inputs, year, &self.config.generation_ratio)?,
            primary: project_primary(&self.inputs.supply_projects, &self.inputs.capacity, year),
            secondary: project_secondary(&self.inputs.secondary_supply, year),
            policy_flow_tu: self.inputs.policy_flows.get(&year).copied().unwrap_or(0.0),
        })
    }

    fn reconstruct(
        &self,
        state: &SimState,
        frame: &YearFrame,
        observed: Option<PriceSignal>,
    ) -> Result<(Evaluation, Option<PriceSignal>), RunError> {
        let tails_price = observed.filter(|_| self.config.optimize_historical_tails);
        let mut eval = self.evaluate(state, frame, tails_price.as_ref())?;
        eval.record.mode = SimulationMode::Reconstruction;
        eval.record.status = YearStatus::Reconstructed;
        eval.record.price = observed;
        Ok((eval, observed.or(state.last_price)))
    }

    // Bounded fixed point: price from the previous iterate's features, tails
    // re-optimised, balance recomputed, until the balance settles.
    fn project(
        &self,
        state: &SimState,
        frame: &YearFrame,
        model: &dyn PriceModel,
    ) -> Result<(Evaluation, Option<PriceSignal>), RunError> {
        let year = frame.demand.year;
        let fp = &self.config.fixed_point;
        let seed = state.last_price.or(self.config.initial_price);
        let first = self.evaluate(state, frame, seed.as_ref())?;

        let mut prev = first.clone();
        let mut residual = f64::INFINITY;
        for iteration in 1..=fp.max_iterations {
            let features = BalanceFeatures::from_record(&prev.record, &self.config.regimes);
            let price = model.price(year, &features);
            let next = self.evaluate(state, frame, Some(&price))?;
            let b_prev = prev.record.net_balance_tu;
            let scale = b_prev
                .abs()
                .max(next.record.feed_tu)
                .max(f64::MIN_POSITIVE);
            residual = (next.record.net_balance_tu - b_prev).abs() / scale;
            debug!(year, iteration, residual, "fixed point iteration");
            prev = next;
            if residual < fp.tolerance {
                let mut eval = prev;
                eval.record.mode = SimulationMode::Projection;
                eval.record.status = YearStatus::Converged { iterations: iteration };
                eval.record.price = Some(price);
                return Ok((eval, Some(price)));
            }
        }

        warn!(
            year,
            iterations = fp.max_iterations,
            residual,
            "price fixed point did not converge; using prior converged price"
        );
        let mut eval = first;
        eval.record.mode = SimulationMode::Projection;
        eval.record.status = YearStatus::ConvergenceFailed {
            iterations: fp.max_iterations,
            residual,
        };
        eval.record.price = seed;
        Ok((eval, seed))
    }

    fn data_tails(&self, rtype: &ReactorType, year: i32) -> f64 {
        self.inputs
            .observed_tails
            .get(&year)
            .copied()
            .unwrap_or(rtype.tails_assay)
    }

    // Tails for one reactor-type group and whether it fell back to data.
    fn group_tails(
        &self,
        rtype: &ReactorType,
        year: i32,
        price: Option<&PriceSignal>,
    ) -> Result<(f64, bool), RunError> {
        let data = self.data_tails(rtype, year);
        let Some(price) = price else {
            return Ok((data, false));
        };
        match optimize_tails(
            rtype.product_assay,
            self.config.feed_assay,
            price,
            &self.config.tails_search,
        ) {
            Ok(opt) => Ok((opt.tails_assay, false)),
            Err(e @ (EnrichError::Convergence { .. } | EnrichError::InvalidPrice)) => {
                warn!(year, reactor_type = %rtype.id.0, error = %e, "tails optimisation fell back to data tails");
                Ok((data, true))
            }
            Err(source) => Err(RunError::InvalidAssay { year, source }),
        }
    }

    fn evaluate(
        &self,
        state: &SimState,
        frame: &YearFrame,
        price: Option<&PriceSignal>,
    ) -> Result<Evaluation, RunError> {
        let year = frame.demand.year;
        let enrich_err = |source| RunError::InvalidAssay { year, source };

        let mut assays: BTreeMap<ReactorTypeId, Assays> = BTreeMap::new();
        let mut fuel: Option<FuelCycleQuantities> = None;
        let mut tails_fallbacks = 0u32;
        for (type_id, product_tu) in frame.demand.by_type() {
            let rtype = self.inputs.reactor_type(&type_id).ok_or_else(|| {
                ValidationError::UnknownReactorType {
                    reactor: String::new(),
                    reactor_type: type_id.0.clone(),
                }
            })?;
            let (tails, fell_back) = if product_tu > 0.0 {
                self.group_tails(rtype, year, price)?
            } else {
                (self.data_tails(rtype, year), false)
            };
            tails_fallbacks += u32::from(fell_back);
            let a = Assays::new(rtype.product_assay, self.config.feed_assay, tails)
                .map_err(enrich_err)?;
            let q = feed_and_swu(product_tu, &a).map_err(enrich_err)?;
            fuel = Some(match fuel {
                Some(acc) => acc.combine(q),
                None => q,
            });
            assays.insert(type_id, a);
        }
        let fuel = fuel.unwrap_or(FuelCycleQuantities {
            tails_assay: self
                .inputs
                .observed_tails
                .get(&year)
                .copied()
                .unwrap_or(DEFAULT_TAILS_ASSAY),
            ..FuelCycleQuantities::default()
        });
        let country_demand = country_records(&frame.demand, &assays).map_err(enrich_err)?;

        let total_supply_tu = frame.primary.delivered_tu + frame.secondary.total_tu;
        let net_balance_tu = total_supply_tu - fuel.feed_tu;
        let (inventory, stock) = state.inventory.advance(net_balance_tu + frame.policy_flow_tu);

        let capacity = &self.inputs.capacity;
        let conversion_cap = capacity.conversion_tu.get(&year).copied();
        let enrichment_cap = capacity.enrichment_tswu.get(&year).copied();
        let ratio = |num: f64, cap: Option<f64>| cap.filter(|c| *c > 0.0).map(|c| num / c);
        let conversion_tightness = ratio(fuel.feed_tu, conversion_cap);
        let enrichment_tightness = ratio(fuel.swu, enrichment_cap);
        let capacity_tightness = match self.config.tightness_basis {
            TightnessBasis::Conversion => conversion_tightness,
            TightnessBasis::Enrichment => enrichment_tightness,
            TightnessBasis::Binding => match (conversion_tightness, enrichment_tightness) {
                (Some(c), Some(e)) => Some(c.max(e)),
                (c, e) => c.or(e),
            },
        };
        let per_feed = |v: f64| (fuel.feed_tu > 0.0).then(|| v / fuel.feed_tu);

        let record = BalanceRecord {
            year,
            mode: SimulationMode::Reconstruction,
            status: YearStatus::Reconstructed,
            product_tu: fuel.product_tu,
            feed_tu: fuel.feed_tu,
            swu: fuel.swu,
            tails_assay: fuel.tails_assay,
            primary_supply_tu: frame.primary.delivered_tu,
            secondary_supply_tu: frame.secondary.total_tu,
            total_supply_tu,
            net_balance_tu,
            policy_flow_tu: frame.policy_flow_tu,
            inventory_tu: stock.total_tu,
            shortage_tu: stock.shortage_tu,
            overflow_tu: stock.overflow_tu,
            unmet_primary_tu: frame.primary.unmet_tu,
            capacity_exceeded: frame.primary.capacity_exceeded(),
            conversion_tightness,
            enrichment_tightness,
            capacity_tightness,
            conversion_spare_tu: conversion_cap.map(|c| c - fuel.feed_tu),
            enrichment_spare_tswu: enrichment_cap.map(|c| c - fuel.swu),
            balance_ratio: per_feed(total_supply_tu),
            inventory_years: per_feed(stock.total_tu),
            price: price.copied(),
            tails_fallbacks,
        };
        Ok(Evaluation {
            record,
            country_demand,
            inventory,
        })
    }
}

/// Apply `scenario` to `baseline` and simulate the effective inputs.
pub fn run_scenario(
    baseline: &InputSet,
    name: &str,
    scenario: &Scenario,
    config: &SimConfig,
    model: Option<&dyn PriceModel>,
) -> Result<BalancePanel, RunError> {
    // a bad baseline is a data fault, not a fault of the scenario laid over it
    validate_inputs(baseline)?;
    let effective = ScenarioEngine::new(baseline).apply(name, scenario)?;
    let mut sim = BalanceSimulator::new(&effective, config)?;
    if let Some(model) = model {
        sim = sim.with_price_model(model);
    }
    sim.run(name)
}
