#![deny(warnings)]

//! Supply/demand balance runtime.
//!
//! Turns a validated input set into a year-by-year balance panel:
//! - reactor demand (first cores and reloads) converted into feed and SWU
//! - primary supply clamped to capacity, signed secondary supply
//! - inventory carried as an explicit state value between years
//! - price feedback in projection years through a bounded fixed point
//!
//! Runs share nothing mutable, so scenarios can be simulated in parallel
//! (see [`batch::run_batch`]).

use thiserror::Error;
use ufc_core::ValidationError;
use ufc_econ::EnrichError;
use ufc_scenario::ConfigurationError;

pub mod batch;
pub mod demand;
pub mod features;
pub mod inventory;
pub mod price_model;
pub mod simulator;
pub mod supply;

pub use batch::run_batch;
pub use features::BalanceFeatures;
pub use inventory::{InventoryOutcome, InventoryTracker};
pub use price_model::{ConstantPrice, PriceEquation, PriceModel, RegressionPriceModel};
pub use simulator::{run_scenario, BalancePanel, BalanceSimulator, SimState, YearOutcome};

/// Errors that stop a run.
#[derive(Debug, Error, PartialEq)]
pub enum RunError {
    #[error("input validation failed: {0}")]
    DataValidation(#[from] ValidationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Physically impossible assays; the run is aborted at `year`.
    #[error("year {year}: {source}")]
    InvalidAssay { year: i32, source: EnrichError },
    #[error("year {0} is outside the simulation horizon")]
    OutsideHorizon(i32),
    #[error("year {year} does not follow {previous}")]
    YearOrder { year: i32, previous: i32 },
}
