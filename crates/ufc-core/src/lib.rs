#![deny(warnings)]

//! Core domain models and invariants for the uranium fuel-cycle balance engine.
//!
//! This crate defines the serializable input tables (fleet, fuel parameters,
//! supply sources, inventories, capacities), the balance output records, and
//! validation helpers that reject physically impossible baseline data before
//! any simulation runs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub mod config;
pub mod trajectory;

pub use config::{
    validate_config, FixedPointConfig, GenerationRatioBounds, RegimeWindow, SimConfig,
    TailsSearch, TightnessBasis,
};
pub use trajectory::Trajectory;

/// Atomic fraction of U-235 in natural uranium.
pub const NATURAL_U235_ASSAY: f64 = 0.00711;
/// Tails assay used when neither data nor a reactor type supplies one.
pub const DEFAULT_TAILS_ASSAY: f64 = 0.0025;
/// Hours in a (non-leap) operating year.
pub const HOURS_PER_YEAR: f64 = 8760.0;
/// Pounds of U3O8 containing one kilogram of uranium.
pub const LB_U3O8_PER_KGU: f64 = 2.599_79;

/// Earliest year the engine accepts anywhere in its inputs.
pub const MIN_YEAR: i32 = 1950;
/// Latest year the engine accepts anywhere in its inputs.
pub const MAX_YEAR: i32 = 2150;

/// Year-indexed numeric series (TU, tSWU, GWh, assay...).
pub type YearSeries = BTreeMap<i32, f64>;

/// Identifier of a reactor design family, e.g. "PWR".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReactorTypeId(pub String);

/// Identifier of a single reactor unit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReactorId(pub String);

/// Identifier of a primary supply project (mine).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

/// Identifier of a secondary supply category.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub String);

/// Identifier of an inventory pool.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolId(pub String);

/// Fuel parameters shared by every unit of one reactor design.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReactorType {
    pub id: ReactorTypeId,
    /// Initial core load in TU of enriched product per GWe.
    pub first_core_tu_per_gwe: f64,
    /// Annual reload in TU of enriched product per GWe.
    pub reload_tu_per_gwe: f64,
    /// Design U-235 assay of the enriched product.
    pub product_assay: f64,
    /// Design tails assay, used when tails are taken from data.
    #[serde(default = "default_tails")]
    pub tails_assay: f64,
}

fn default_tails() -> f64 {
    DEFAULT_TAILS_ASSAY
}

/// A reactor unit in the fleet.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReactorUnit {
    pub id: ReactorId,
    #[serde(default)]
    pub name: String,
    pub country: String,
    pub reactor_type: ReactorTypeId,
    /// Net capacity in GWe (> 0).
    pub capacity_gwe: f64,
    /// Commercial operation year. Optional in the input so that a missing
    /// value is reported instead of defaulted.
    #[serde(default)]
    pub start_year: Option<i32>,
    /// Last operating year (inclusive).
    #[serde(default)]
    pub retirement_year: Option<i32>,
    /// Observed net generation in GWh by year.
    #[serde(default)]
    pub generation_gwh: YearSeries,
}

impl ReactorUnit {
    /// Whether the unit operates in `year`. Units without a start year never do.
    pub fn is_active(&self, year: i32) -> bool {
        match self.start_year {
            Some(start) => year >= start && self.retirement_year.map_or(true, |r| year <= r),
            None => false,
        }
    }
}

/// Physical result of enriching one product quantity.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FuelCycleQuantities {
    pub product_tu: f64,
    pub feed_tu: f64,
    /// Separative work in tSWU (product measured in TU).
    pub swu: f64,
    pub tails_assay: f64,
}

impl FuelCycleQuantities {
    /// Component-wise sum; the tails assay becomes the product-weighted mean.
    pub fn combine(self, other: FuelCycleQuantities) -> FuelCycleQuantities {
        let product = self.product_tu + other.product_tu;
        let tails = if product > 0.0 {
            (self.tails_assay * self.product_tu + other.tails_assay * other.product_tu) / product
        } else {
            self.tails_assay.max(other.tails_assay)
        };
        FuelCycleQuantities {
            product_tu: product,
            feed_tu: self.feed_tu + other.feed_tu,
            swu: self.swu + other.swu,
            tails_assay: tails,
        }
    }
}

/// Primary (mined) supply project.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SupplyProject {
    pub id: ProjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
    pub trajectory: Trajectory,
    /// Merit-order key: higher tiers are costlier and dropped first.
    pub cost_tier: u32,
    /// Reported production in TU; takes precedence over the trajectory.
    #[serde(default)]
    pub actuals: YearSeries,
}

impl SupplyProject {
    /// Output in `year`: reported actuals when present, else the trajectory.
    pub fn volume_at(&self, year: i32) -> f64 {
        match self.actuals.get(&year) {
            Some(v) => v.max(0.0),
            None => self.trajectory.volume_at(year),
        }
    }
}

/// Kinds of secondary supply.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryKind {
    /// Highly enriched uranium blended down to LEU.
    Downblend,
    /// Enricher underfeeding releasing natural uranium.
    Underfeed,
    /// Enricher overfeeding consuming natural uranium.
    Overfeed,
    /// Recycled uranium and MOX from reprocessing.
    Reprocessing,
    /// Government or producer stock releases.
    StockDraw,
}

impl SecondaryKind {
    /// Sign of this kind's contribution to supply.
    pub fn sign(self) -> f64 {
        match self {
            SecondaryKind::Overfeed => -1.0,
            _ => 1.0,
        }
    }
}

/// Category-level secondary supply source.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SecondarySupplyCategory {
    pub id: CategoryId,
    pub kind: SecondaryKind,
    pub trajectory: Trajectory,
    #[serde(default)]
    pub actuals: YearSeries,
}

impl SecondarySupplyCategory {
    /// Unsigned volume in `year`.
    pub fn volume_at(&self, year: i32) -> f64 {
        match self.actuals.get(&year) {
            Some(v) => v.max(0.0),
            None => self.trajectory.volume_at(year),
        }
    }

    /// Volume with the kind's sign applied.
    pub fn signed_volume_at(&self, year: i32) -> f64 {
        self.kind.sign() * self.volume_at(year)
    }
}

/// Inventory level with its policy bounds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct InventoryState {
    /// Current stock in TU.
    pub volume: f64,
    /// Minimum strategic level in TU.
    #[serde(default)]
    pub floor: f64,
    /// Optional cap in TU.
    #[serde(default)]
    pub ceiling: Option<f64>,
}

/// A tracked inventory pool and its starting state (the year before the horizon).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InventoryPool {
    pub id: PoolId,
    /// Share of the annual net flow routed to this pool.
    #[serde(default = "default_share")]
    pub share: f64,
    #[serde(flatten)]
    pub initial: InventoryState,
}

fn default_share() -> f64 {
    1.0
}

/// Conversion and enrichment capacities plus an optional explicit ceiling on
/// primary supply, by year.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CapacityTables {
    /// Conversion capacity in TU.
    #[serde(default)]
    pub conversion_tu: YearSeries,
    /// Enrichment capacity in tSWU.
    #[serde(default)]
    pub enrichment_tswu: YearSeries,
    /// Explicit ceiling for primary supply in TU.
    #[serde(default)]
    pub primary_ceiling_tu: YearSeries,
}

impl CapacityTables {
    /// Ceiling that clamps primary supply: the explicit ceiling when present,
    /// else conversion capacity, else none.
    pub fn primary_ceiling(&self, year: i32) -> Option<f64> {
        self.primary_ceiling_tu
            .get(&year)
            .or_else(|| self.conversion_tu.get(&year))
            .copied()
    }
}

/// Commodity price pair for one year.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PriceSignal {
    /// Spot or term U3O8 price in USD per lb U3O8.
    pub u3o8_usd_per_lb: Decimal,
    /// SWU price in USD per SWU.
    pub swu_usd_per_swu: Decimal,
}

/// Simulation horizon, inclusive on both ends.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Horizon {
    pub start_year: i32,
    pub end_year: i32,
}

impl Horizon {
    pub fn contains(&self, year: i32) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }

    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.start_year..=self.end_year
    }
}

/// Complete baseline input set for one run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InputSet {
    pub horizon: Horizon,
    pub reactor_types: Vec<ReactorType>,
    pub reactors: Vec<ReactorUnit>,
    #[serde(default)]
    pub supply_projects: Vec<SupplyProject>,
    #[serde(default)]
    pub secondary_supply: Vec<SecondarySupplyCategory>,
    pub inventory_pools: Vec<InventoryPool>,
    #[serde(default)]
    pub capacity: CapacityTables,
    /// Observed prices; years present here are reconstructed, not projected.
    #[serde(default)]
    pub observed_prices: BTreeMap<i32, PriceSignal>,
    /// Observed industry tails assay by year.
    #[serde(default)]
    pub observed_tails: YearSeries,
    /// Inventory policy flows in TU (positive adds to stock).
    #[serde(default)]
    pub policy_flows: YearSeries,
}

impl InputSet {
    pub fn reactor_type(&self, id: &ReactorTypeId) -> Option<&ReactorType> {
        self.reactor_types.iter().find(|t| &t.id == id)
    }
}

/// How a year was computed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Historical year: tails from data, no price feedback.
    Reconstruction,
    /// Forward year: tails optimised against the price model's fixed point.
    Projection,
}

/// Outcome status of one simulated year.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum YearStatus {
    Reconstructed,
    Converged { iterations: u32 },
    /// The price fixed point did not settle; the year was computed from the
    /// prior year's last converged price.
    ConvergenceFailed { iterations: u32, residual: f64 },
}

impl YearStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, YearStatus::ConvergenceFailed { .. })
    }
}

/// One year of the supply/demand balance panel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BalanceRecord {
    pub year: i32,
    pub mode: SimulationMode,
    pub status: YearStatus,
    pub product_tu: f64,
    pub feed_tu: f64,
    pub swu: f64,
    /// Product-weighted tails assay used this year.
    pub tails_assay: f64,
    pub primary_supply_tu: f64,
    pub secondary_supply_tu: f64,
    pub total_supply_tu: f64,
    /// Total supply minus feed demand.
    pub net_balance_tu: f64,
    pub policy_flow_tu: f64,
    /// Inventory across all pools after this year's update.
    pub inventory_tu: f64,
    /// Draw that could not be met without breaching an inventory floor.
    pub shortage_tu: f64,
    /// Stock above an inventory ceiling.
    pub overflow_tu: f64,
    /// Primary supply above the capacity ceiling, dropped for good.
    pub unmet_primary_tu: f64,
    pub capacity_exceeded: bool,
    /// Feed demand over conversion capacity.
    pub conversion_tightness: Option<f64>,
    /// SWU demand over enrichment capacity.
    pub enrichment_tightness: Option<f64>,
    /// Tightness on the configured basis.
    pub capacity_tightness: Option<f64>,
    pub conversion_spare_tu: Option<f64>,
    pub enrichment_spare_tswu: Option<f64>,
    /// Total supply over feed demand.
    pub balance_ratio: Option<f64>,
    /// Inventory over feed demand.
    pub inventory_years: Option<f64>,
    pub price: Option<PriceSignal>,
    /// Reactor-type groups whose tails optimisation fell back to data tails.
    pub tails_fallbacks: u32,
}

/// Demand of one country in one year.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CountryDemandRecord {
    pub country: String,
    pub year: i32,
    pub first_core_tu: f64,
    pub reload_tu: f64,
    pub product_tu: f64,
    pub feed_tu: f64,
    pub swu: f64,
}

/// Validation errors for baseline inputs.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Year outside supported range [1950, 2150].
    #[error("year {0} is out of supported range [1950, 2150]")]
    YearOutOfRange(i32),
    #[error("horizon starts in {start} after it ends in {end}")]
    HorizonInverted { start: i32, end: i32 },
    #[error("reactor {reactor}: capacity must be > 0, got {value}")]
    NonPositiveCapacity { reactor: String, value: f64 },
    #[error("reactor {0}: missing commercial start year")]
    MissingStartYear(String),
    #[error("reactor {reactor}: retires in {retirement} before starting in {start}")]
    RetirementBeforeStart {
        reactor: String,
        start: i32,
        retirement: i32,
    },
    #[error("{entity}: assay {assay} outside (0, 1)")]
    AssayOutOfRange { entity: String, assay: f64 },
    #[error("reactor {reactor}: unknown reactor type {reactor_type}")]
    UnknownReactorType { reactor: String, reactor_type: String },
    #[error("duplicate identifier: {0}")]
    DuplicateId(String),
    #[error("{entity}: {field} must be finite and >= 0")]
    NegativeValue { entity: String, field: String },
    #[error("{entity}: invalid trajectory: {reason}")]
    InvalidTrajectory { entity: String, reason: String },
    #[error("inventory pool {0}: initial volume below floor")]
    InventoryBelowFloor(String),
    #[error("inventory pool {0}: ceiling below floor")]
    CeilingBelowFloor(String),
    #[error("inventory pool shares sum to {0}, expected 1")]
    InvalidShares(f64),
    #[error("at least one inventory pool with an initial state is required")]
    MissingInventory,
    #[error("{entity}: price must be > 0")]
    NonPositivePrice { entity: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn check_year(year: i32) -> Result<(), ValidationError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ValidationError::YearOutOfRange(year));
    }
    Ok(())
}

fn check_assay(entity: &str, assay: f64) -> Result<(), ValidationError> {
    if !(assay.is_finite() && assay > 0.0 && assay < 1.0) {
        return Err(ValidationError::AssayOutOfRange {
            entity: entity.to_string(),
            assay,
        });
    }
    Ok(())
}

fn check_non_negative(entity: &str, field: &str, v: f64) -> Result<(), ValidationError> {
    if !v.is_finite() || v < 0.0 {
        return Err(ValidationError::NegativeValue {
            entity: entity.to_string(),
            field: field.to_string(),
        });
    }
    Ok(())
}

fn check_series(entity: &str, field: &str, s: &YearSeries) -> Result<(), ValidationError> {
    for (year, v) in s {
        check_year(*year)?;
        check_non_negative(entity, field, *v)?;
    }
    Ok(())
}

/// Validate a reactor type's fuel parameters.
pub fn validate_reactor_type(t: &ReactorType) -> Result<(), ValidationError> {
    let entity = format!("reactor type {}", t.id.0);
    check_non_negative(&entity, "first_core_tu_per_gwe", t.first_core_tu_per_gwe)?;
    check_non_negative(&entity, "reload_tu_per_gwe", t.reload_tu_per_gwe)?;
    check_assay(&entity, t.product_assay)?;
    check_assay(&entity, t.tails_assay)?;
    Ok(())
}

/// Validate a reactor unit against the known reactor types.
pub fn validate_reactor(
    r: &ReactorUnit,
    types: &BTreeSet<&ReactorTypeId>,
) -> Result<(), ValidationError> {
    if !r.capacity_gwe.is_finite() || r.capacity_gwe <= 0.0 {
        return Err(ValidationError::NonPositiveCapacity {
            reactor: r.id.0.clone(),
            value: r.capacity_gwe,
        });
    }
    let start = r
        .start_year
        .ok_or_else(|| ValidationError::MissingStartYear(r.id.0.clone()))?;
    check_year(start)?;
    if let Some(ret) = r.retirement_year {
        check_year(ret)?;
        if ret < start {
            return Err(ValidationError::RetirementBeforeStart {
                reactor: r.id.0.clone(),
                start,
                retirement: ret,
            });
        }
    }
    if !types.contains(&r.reactor_type) {
        return Err(ValidationError::UnknownReactorType {
            reactor: r.id.0.clone(),
            reactor_type: r.reactor_type.0.clone(),
        });
    }
    check_series(&format!("reactor {}", r.id.0), "generation_gwh", &r.generation_gwh)?;
    Ok(())
}

/// Validate a primary supply project.
pub fn validate_supply_project(p: &SupplyProject) -> Result<(), ValidationError> {
    let entity = format!("project {}", p.id.0);
    p.trajectory
        .check()
        .map_err(|reason| ValidationError::InvalidTrajectory {
            entity: entity.clone(),
            reason,
        })?;
    p.trajectory.milestone_years().try_for_each(check_year)?;
    check_series(&entity, "actuals", &p.actuals)
}

/// Validate a secondary supply category.
pub fn validate_secondary(c: &SecondarySupplyCategory) -> Result<(), ValidationError> {
    let entity = format!("secondary {}", c.id.0);
    c.trajectory
        .check()
        .map_err(|reason| ValidationError::InvalidTrajectory {
            entity: entity.clone(),
            reason,
        })?;
    c.trajectory.milestone_years().try_for_each(check_year)?;
    check_series(&entity, "actuals", &c.actuals)
}

/// Validate an inventory pool's bounds and initial state.
pub fn validate_pool(p: &InventoryPool) -> Result<(), ValidationError> {
    let entity = format!("pool {}", p.id.0);
    check_non_negative(&entity, "floor", p.initial.floor)?;
    check_non_negative(&entity, "volume", p.initial.volume)?;
    check_non_negative(&entity, "share", p.share)?;
    if let Some(c) = p.initial.ceiling {
        check_non_negative(&entity, "ceiling", c)?;
        if c < p.initial.floor {
            return Err(ValidationError::CeilingBelowFloor(p.id.0.clone()));
        }
    }
    if p.initial.volume < p.initial.floor {
        return Err(ValidationError::InventoryBelowFloor(p.id.0.clone()));
    }
    Ok(())
}

/// Validate a price pair.
pub fn validate_price(entity: &str, p: &PriceSignal) -> Result<(), ValidationError> {
    if p.u3o8_usd_per_lb <= Decimal::ZERO || p.swu_usd_per_swu <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice {
            entity: entity.to_string(),
        });
    }
    Ok(())
}

fn insert_unique<'a>(seen: &mut BTreeSet<&'a str>, id: &'a str) -> Result<(), ValidationError> {
    if !seen.insert(id) {
        return Err(ValidationError::DuplicateId(id.to_string()));
    }
    Ok(())
}

/// Validate the whole input set, including cross-references.
pub fn validate_inputs(inputs: &InputSet) -> Result<(), ValidationError> {
    let h = inputs.horizon;
    check_year(h.start_year)?;
    check_year(h.end_year)?;
    if h.start_year > h.end_year {
        return Err(ValidationError::HorizonInverted {
            start: h.start_year,
            end: h.end_year,
        });
    }

    let mut type_ids: BTreeSet<&ReactorTypeId> = BTreeSet::new();
    for t in &inputs.reactor_types {
        validate_reactor_type(t)?;
        if !type_ids.insert(&t.id) {
            return Err(ValidationError::DuplicateId(t.id.0.clone()));
        }
    }

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for r in &inputs.reactors {
        validate_reactor(r, &type_ids)?;
        insert_unique(&mut seen, &r.id.0)?;
    }

    seen.clear();
    for p in &inputs.supply_projects {
        validate_supply_project(p)?;
        insert_unique(&mut seen, &p.id.0)?;
    }

    seen.clear();
    for c in &inputs.secondary_supply {
        validate_secondary(c)?;
        insert_unique(&mut seen, &c.id.0)?;
    }

    if inputs.inventory_pools.is_empty() {
        return Err(ValidationError::MissingInventory);
    }
    seen.clear();
    let mut share_sum = 0.0;
    for p in &inputs.inventory_pools {
        validate_pool(p)?;
        insert_unique(&mut seen, &p.id.0)?;
        share_sum += p.share;
    }
    if (share_sum - 1.0).abs() > 1e-9 {
        return Err(ValidationError::InvalidShares(share_sum));
    }

    check_series("capacity", "conversion_tu", &inputs.capacity.conversion_tu)?;
    check_series("capacity", "enrichment_tswu", &inputs.capacity.enrichment_tswu)?;
    check_series("capacity", "primary_ceiling_tu", &inputs.capacity.primary_ceiling_tu)?;

    for (year, p) in &inputs.observed_prices {
        check_year(*year)?;
        validate_price(&format!("observed price {year}"), p)?;
    }
    for (year, t) in &inputs.observed_tails {
        check_year(*year)?;
        check_assay(&format!("observed tails {year}"), *t)?;
    }
    for (year, v) in &inputs.policy_flows {
        check_year(*year)?;
        if !v.is_finite() {
            return Err(ValidationError::NegativeValue {
                entity: format!("policy flow {year}"),
                field: "flow".into(),
            });
        }
    }
    Ok(())
}
