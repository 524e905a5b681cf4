//! Override vocabulary: what an override can target, which field it touches,
//! and how the new value combines with the baseline.

use serde::{Deserialize, Serialize};
use std::fmt;
use ufc_core::YearSeries;

/// Kind of entity an override targets.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Reactor,
    ReactorType,
    Project,
    Secondary,
    Pool,
    /// Conversion/enrichment capacity tables (no id).
    Capacity,
    /// Market-wide series: observed tails, policy flows (no id).
    Market,
}

impl EntityKind {
    /// Whether overrides on this kind name a specific entity.
    pub fn is_keyed(self) -> bool {
        !matches!(self, EntityKind::Capacity | EntityKind::Market)
    }
}

/// Field touched by an override.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    StartYear,
    RetirementYear,
    CapacityGwe,
    GenerationGwh,
    FirstCoreTuPerGwe,
    ReloadTuPerGwe,
    ProductAssay,
    TailsAssay,
    PlateauVolume,
    DeclineRate,
    CostTier,
    Output,
    Volume,
    Floor,
    Ceiling,
    ConversionTu,
    EnrichmentTswu,
    PrimaryCeilingTu,
    ObservedTails,
    PolicyFlow,
}

impl Field {
    /// Fields holding a year or an ordinal, which cannot be scaled.
    pub fn is_discrete(self) -> bool {
        matches!(self, Field::StartYear | Field::RetirementYear | Field::CostTier)
    }
}

/// How the override value combines with the baseline value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Replace,
    Add,
    Multiply,
}

impl Transform {
    pub fn apply(self, base: f64, value: f64) -> f64 {
        match self {
            Transform::Replace => value,
            Transform::Add => base + value,
            Transform::Multiply => base * value,
        }
    }
}

/// Inclusive range of years an override is effective over.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.start..=self.end
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// One declarative diff against the baseline input set.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Override {
    pub entity: EntityKind,
    #[serde(default)]
    pub id: Option<String>,
    pub field: Field,
    pub transform: Transform,
    pub value: f64,
    /// Required for series fields, forbidden for attribute fields.
    #[serde(default)]
    pub years: Option<YearRange>,
}

/// Whether `field` on `entity` is a per-year series (`Some(true)`), a plain
/// attribute (`Some(false)`), or not a field of that entity at all (`None`).
pub fn field_shape(entity: EntityKind, field: Field) -> Option<bool> {
    use EntityKind as E;
    use Field as F;
    match (entity, field) {
        (E::Reactor, F::StartYear | F::RetirementYear | F::CapacityGwe) => Some(false),
        (E::Reactor, F::GenerationGwh) => Some(true),
        (
            E::ReactorType,
            F::FirstCoreTuPerGwe | F::ReloadTuPerGwe | F::ProductAssay | F::TailsAssay,
        ) => Some(false),
        (E::Project, F::StartYear | F::PlateauVolume | F::DeclineRate | F::CostTier) => {
            Some(false)
        }
        (E::Secondary, F::StartYear | F::PlateauVolume | F::DeclineRate) => Some(false),
        (E::Project | E::Secondary, F::Output) => Some(true),
        (E::Pool, F::Volume | F::Floor | F::Ceiling) => Some(false),
        (E::Capacity, F::ConversionTu | F::EnrichmentTswu | F::PrimaryCeilingTu) => Some(true),
        (E::Market, F::ObservedTails | F::PolicyFlow) => Some(true),
        _ => None,
    }
}

/// Apply a transform to every year of `range` in a series whose missing
/// entries mean "nothing". Replace and add create entries (add starts from
/// zero); multiply leaves missing entries missing.
pub fn apply_series(series: &mut YearSeries, range: YearRange, t: Transform, value: f64) {
    for year in range.years() {
        match (series.get(&year).copied(), t) {
            (Some(base), _) => {
                series.insert(year, t.apply(base, value));
            }
            (None, Transform::Replace | Transform::Add) => {
                series.insert(year, t.apply(0.0, value));
            }
            (None, Transform::Multiply) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_semantics() {
        let mut s = YearSeries::new();
        s.insert(2020, 10.0);
        let r = YearRange {
            start: 2020,
            end: 2021,
        };
        apply_series(&mut s, r, Transform::Multiply, 2.0);
        assert_eq!(s.get(&2020), Some(&20.0));
        assert_eq!(s.get(&2021), None);
        apply_series(&mut s, r, Transform::Add, 5.0);
        assert_eq!(s.get(&2020), Some(&25.0));
        assert_eq!(s.get(&2021), Some(&5.0));
        apply_series(&mut s, r, Transform::Replace, 1.0);
        assert_eq!(s.values().copied().collect::<Vec<_>>(), vec![1.0, 1.0]);
    }

    #[test]
    fn shapes() {
        assert_eq!(field_shape(EntityKind::Reactor, Field::GenerationGwh), Some(true));
        assert_eq!(field_shape(EntityKind::Project, Field::StartYear), Some(false));
        assert_eq!(field_shape(EntityKind::Pool, Field::Output), None);
        assert_eq!(field_shape(EntityKind::Secondary, Field::CostTier), None);
    }
}
