#![deny(warnings)]

//! Declarative scenario overrides.
//!
//! A scenario is pure data: reactor new builds plus an ordered list of
//! overrides (replace / add / multiply over an optional year range). The
//! [`ScenarioEngine`] applies them to a baseline [`InputSet`] before any
//! simulation runs and produces an effective input snapshot.
//!
//! Composition order, which callers can rely on:
//! 1. new builds are appended to the fleet in declaration order;
//! 2. overrides are applied one by one in declaration order, each reading the
//!    value left by the previous one. For the same (entity, field, year) the
//!    last `replace` wins, and `add`/`multiply` compound in order.
//!
//! Any malformed override fails the whole scenario with a
//! [`ConfigurationError`]; no partially applied snapshot is ever returned.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use ufc_core::{ReactorUnit, ValidationError};

mod engine;
pub mod overrides;

pub use engine::ScenarioEngine;
pub use overrides::{EntityKind, Field, Override, Transform, YearRange};

/// Why a single override was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum OverrideFault {
    #[error("{entity:?} {id} not found")]
    UnknownEntity { entity: EntityKind, id: String },
    #[error("{0:?} overrides need an id")]
    MissingId(EntityKind),
    #[error("{0:?} overrides take no id")]
    UnexpectedId(EntityKind),
    #[error("{field:?} is not a field of {entity:?}")]
    FieldNotApplicable { entity: EntityKind, field: Field },
    #[error("{transform:?} cannot be applied to {field:?}")]
    TransformNotApplicable { field: Field, transform: Transform },
    #[error("{0:?} is a per-year series and needs a year range")]
    YearRangeRequired(Field),
    #[error("{0:?} is not a per-year series; remove the year range")]
    YearRangeNotApplicable(Field),
    #[error("year range {0} is inverted")]
    InvertedRange(YearRange),
    #[error("year range {range} outside horizon {start}..={end}")]
    OutsideHorizon { range: YearRange, start: i32, end: i32 },
    #[error("value must be finite")]
    NonFinite,
    #[error("value {0} must be a whole number")]
    NonIntegral(f64),
    #[error("year value {0} leaves the supported range")]
    YearOutOfRange(f64),
    #[error("{0:?} has no baseline value to add to or scale")]
    NoBaseValue(Field),
}

/// Errors raised while loading or applying scenarios.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("scenario file could not be parsed: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("scenario {scenario}, override #{index}: {fault}")]
    Override {
        scenario: String,
        index: usize,
        fault: OverrideFault,
    },
    #[error("scenario {scenario}, new build #{index}: {reason}")]
    NewBuild {
        scenario: String,
        index: usize,
        reason: String,
    },
    #[error("scenario {scenario} produces invalid inputs: {source}")]
    InvalidResult {
        scenario: String,
        source: ValidationError,
    },
    /// A configuration value outside the engine's accepted vocabulary.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigurationError {
    fn from(e: std::io::Error) -> Self {
        ConfigurationError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigurationError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigurationError::Parse(e.to_string())
    }
}

/// A named set of new builds and overrides.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub new_builds: Vec<ReactorUnit>,
    #[serde(default)]
    pub overrides: Vec<Override>,
}

/// Scenario file contents: scenario name to scenario.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ScenarioSet {
    pub scenarios: BTreeMap<String, Scenario>,
}

impl ScenarioSet {
    /// Parse a YAML scenario file.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a YAML scenario file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Look up a scenario by name.
    pub fn get(&self, name: &str) -> Result<&Scenario, ConfigurationError> {
        self.scenarios
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownScenario(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }
}
