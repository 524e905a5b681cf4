use crate::overrides::{apply_series, field_shape, EntityKind, Field, Override, Transform};
use crate::{ConfigurationError, OverrideFault, Scenario};
use tracing::{debug, info};
use ufc_core::{validate_inputs, InputSet, Trajectory, MAX_YEAR, MIN_YEAR};

/// Applies scenarios to a read-only baseline.
pub struct ScenarioEngine<'a> {
    baseline: &'a InputSet,
}

impl<'a> ScenarioEngine<'a> {
    pub fn new(baseline: &'a InputSet) -> Self {
        Self { baseline }
    }

    /// Check `scenario` against the baseline by applying it to a scratch copy.
    /// The effective inputs are dropped; the baseline is never touched.
    pub fn validate(&self, name: &str, scenario: &Scenario) -> Result<(), ConfigurationError> {
        self.apply(name, scenario).map(|_| ())
    }

    /// Produce the effective input set for `scenario`.
    ///
    /// Structural checks (targets, fields, ranges, values) run over the whole
    /// override list before the first one is applied.
    pub fn apply(&self, name: &str, scenario: &Scenario) -> Result<InputSet, ConfigurationError> {
        let mut effective = self.baseline.clone();

        for (index, unit) in scenario.new_builds.iter().enumerate() {
            if effective.reactors.iter().any(|r| r.id == unit.id) {
                return Err(ConfigurationError::NewBuild {
                    scenario: name.to_string(),
                    index,
                    reason: format!("reactor {} already exists", unit.id.0),
                });
            }
            effective.reactors.push(unit.clone());
        }

        let wrap = |index: usize| {
            move |fault: OverrideFault| ConfigurationError::Override {
                scenario: name.to_string(),
                index,
                fault,
            }
        };

        for (index, ov) in scenario.overrides.iter().enumerate() {
            check_override(&effective, ov).map_err(wrap(index))?;
        }
        for (index, ov) in scenario.overrides.iter().enumerate() {
            apply_override(&mut effective, ov).map_err(wrap(index))?;
            debug!(scenario = name, index, entity = ?ov.entity, field = ?ov.field, "override applied");
        }

        validate_inputs(&effective).map_err(|source| ConfigurationError::InvalidResult {
            scenario: name.to_string(),
            source,
        })?;
        info!(
            scenario = name,
            new_builds = scenario.new_builds.len(),
            overrides = scenario.overrides.len(),
            "scenario applied"
        );
        Ok(effective)
    }
}

fn entity_exists(inputs: &InputSet, entity: EntityKind, id: &str) -> bool {
    match entity {
        EntityKind::Reactor => inputs.reactors.iter().any(|r| r.id.0 == id),
        EntityKind::ReactorType => inputs.reactor_types.iter().any(|t| t.id.0 == id),
        EntityKind::Project => inputs.supply_projects.iter().any(|p| p.id.0 == id),
        EntityKind::Secondary => inputs.secondary_supply.iter().any(|c| c.id.0 == id),
        EntityKind::Pool => inputs.inventory_pools.iter().any(|p| p.id.0 == id),
        EntityKind::Capacity | EntityKind::Market => true,
    }
}

fn check_override(inputs: &InputSet, ov: &Override) -> Result<(), OverrideFault> {
    match (&ov.id, ov.entity.is_keyed()) {
        (None, true) => return Err(OverrideFault::MissingId(ov.entity)),
        (Some(_), false) => return Err(OverrideFault::UnexpectedId(ov.entity)),
        (Some(id), true) if !entity_exists(inputs, ov.entity, id) => {
            return Err(OverrideFault::UnknownEntity {
                entity: ov.entity,
                id: id.clone(),
            })
        }
        _ => {}
    }

    let is_series =
        field_shape(ov.entity, ov.field).ok_or(OverrideFault::FieldNotApplicable {
            entity: ov.entity,
            field: ov.field,
        })?;
    match (is_series, ov.years) {
        (true, None) => return Err(OverrideFault::YearRangeRequired(ov.field)),
        (false, Some(_)) => return Err(OverrideFault::YearRangeNotApplicable(ov.field)),
        (true, Some(range)) => {
            if range.start > range.end {
                return Err(OverrideFault::InvertedRange(range));
            }
            let h = inputs.horizon;
            if !(h.contains(range.start) && h.contains(range.end)) {
                return Err(OverrideFault::OutsideHorizon {
                    range,
                    start: h.start_year,
                    end: h.end_year,
                });
            }
        }
        (false, None) => {}
    }

    if !ov.value.is_finite() {
        return Err(OverrideFault::NonFinite);
    }
    if ov.field.is_discrete() {
        if ov.transform == Transform::Multiply {
            return Err(OverrideFault::TransformNotApplicable {
                field: ov.field,
                transform: ov.transform,
            });
        }
        if ov.value.fract() != 0.0 {
            return Err(OverrideFault::NonIntegral(ov.value));
        }
    }
    if matches!(ov.field, Field::StartYear | Field::RetirementYear) {
        // replacements name a year; deltas may span at most the supported range
        let (lo, hi) = match ov.transform {
            Transform::Replace => (MIN_YEAR, MAX_YEAR),
            _ => (MIN_YEAR - MAX_YEAR, MAX_YEAR - MIN_YEAR),
        };
        if ov.value < f64::from(lo) || ov.value > f64::from(hi) {
            return Err(OverrideFault::YearOutOfRange(ov.value));
        }
    }
    Ok(())
}

fn shift_year(base: i32, t: Transform, value: f64) -> i32 {
    match t {
        Transform::Replace => value as i32,
        _ => base.saturating_add(value as i32),
    }
}

fn shift_trajectory(traj: &Trajectory, t: Transform, value: f64) -> Result<Trajectory, OverrideFault> {
    let current = traj
        .start_year()
        .ok_or(OverrideFault::NoBaseValue(Field::StartYear))?;
    Ok(traj.shifted(shift_year(current, t, value).saturating_sub(current)))
}

fn scale_param(slot: Option<&mut f64>, field: Field, t: Transform, value: f64) -> Result<(), OverrideFault> {
    let slot = slot.ok_or(OverrideFault::NoBaseValue(field))?;
    *slot = t.apply(*slot, value);
    Ok(())
}

fn apply_override(inputs: &mut InputSet, ov: &Override) -> Result<(), OverrideFault> {
    let id = ov.id.as_deref().unwrap_or_default();
    let (t, v) = (ov.transform, ov.value);
    let unknown = || OverrideFault::UnknownEntity {
        entity: ov.entity,
        id: id.to_string(),
    };

    match ov.entity {
        EntityKind::Reactor => {
            let r = inputs
                .reactors
                .iter_mut()
                .find(|r| r.id.0 == id)
                .ok_or_else(unknown)?;
            match ov.field {
                Field::StartYear => {
                    let base = r.start_year.ok_or(OverrideFault::NoBaseValue(ov.field))?;
                    r.start_year = Some(shift_year(base, t, v));
                }
                Field::RetirementYear => match (r.retirement_year, t) {
                    (_, Transform::Replace) => r.retirement_year = Some(v as i32),
                    (Some(base), _) => r.retirement_year = Some(shift_year(base, t, v)),
                    (None, _) => return Err(OverrideFault::NoBaseValue(ov.field)),
                },
                Field::CapacityGwe => r.capacity_gwe = t.apply(r.capacity_gwe, v),
                Field::GenerationGwh => {
                    if let Some(range) = ov.years {
                        apply_series(&mut r.generation_gwh, range, t, v);
                    }
                }
                _ => unreachable_field(ov)?,
            }
        }
        EntityKind::ReactorType => {
            let rt = inputs
                .reactor_types
                .iter_mut()
                .find(|rt| rt.id.0 == id)
                .ok_or_else(unknown)?;
            let slot = match ov.field {
                Field::FirstCoreTuPerGwe => &mut rt.first_core_tu_per_gwe,
                Field::ReloadTuPerGwe => &mut rt.reload_tu_per_gwe,
                Field::ProductAssay => &mut rt.product_assay,
                Field::TailsAssay => &mut rt.tails_assay,
                _ => return unreachable_field(ov),
            };
            *slot = t.apply(*slot, v);
        }
        EntityKind::Project => {
            let p = inputs
                .supply_projects
                .iter_mut()
                .find(|p| p.id.0 == id)
                .ok_or_else(unknown)?;
            match ov.field {
                Field::StartYear => p.trajectory = shift_trajectory(&p.trajectory, t, v)?,
                Field::PlateauVolume => {
                    scale_param(p.trajectory.plateau_volume_mut(), ov.field, t, v)?
                }
                Field::DeclineRate => scale_param(p.trajectory.decline_rate_mut(), ov.field, t, v)?,
                Field::CostTier => {
                    let tier = t.apply(p.cost_tier as f64, v).max(0.0);
                    p.cost_tier = tier as u32;
                }
                Field::Output => {
                    if let Some(range) = ov.years {
                        for year in range.years() {
                            let pinned = t.apply(p.volume_at(year), v).max(0.0);
                            p.actuals.insert(year, pinned);
                        }
                    }
                }
                _ => unreachable_field(ov)?,
            }
        }
        EntityKind::Secondary => {
            let c = inputs
                .secondary_supply
                .iter_mut()
                .find(|c| c.id.0 == id)
                .ok_or_else(unknown)?;
            match ov.field {
                Field::StartYear => c.trajectory = shift_trajectory(&c.trajectory, t, v)?,
                Field::PlateauVolume => {
                    scale_param(c.trajectory.plateau_volume_mut(), ov.field, t, v)?
                }
                Field::DeclineRate => scale_param(c.trajectory.decline_rate_mut(), ov.field, t, v)?,
                Field::Output => {
                    if let Some(range) = ov.years {
                        for year in range.years() {
                            let pinned = t.apply(c.volume_at(year), v).max(0.0);
                            c.actuals.insert(year, pinned);
                        }
                    }
                }
                _ => unreachable_field(ov)?,
            }
        }
        EntityKind::Pool => {
            let pool = inputs
                .inventory_pools
                .iter_mut()
                .find(|p| p.id.0 == id)
                .ok_or_else(unknown)?;
            let state = &mut pool.initial;
            match ov.field {
                Field::Volume => state.volume = t.apply(state.volume, v),
                Field::Floor => state.floor = t.apply(state.floor, v),
                Field::Ceiling => match (state.ceiling, t) {
                    (_, Transform::Replace) => state.ceiling = Some(v),
                    (Some(base), _) => state.ceiling = Some(t.apply(base, v)),
                    (None, _) => return Err(OverrideFault::NoBaseValue(ov.field)),
                },
                _ => unreachable_field(ov)?,
            }
        }
        EntityKind::Capacity | EntityKind::Market => {
            let series = match ov.field {
                Field::ConversionTu => &mut inputs.capacity.conversion_tu,
                Field::EnrichmentTswu => &mut inputs.capacity.enrichment_tswu,
                Field::PrimaryCeilingTu => &mut inputs.capacity.primary_ceiling_tu,
                Field::ObservedTails => &mut inputs.observed_tails,
                Field::PolicyFlow => &mut inputs.policy_flows,
                _ => return unreachable_field(ov),
            };
            if let Some(range) = ov.years {
                apply_series(series, range, t, v);
            }
        }
    }
    Ok(())
}

// check_override has already rejected fields that do not belong to the entity.
fn unreachable_field(ov: &Override) -> Result<(), OverrideFault> {
    Err(OverrideFault::FieldNotApplicable {
        entity: ov.entity,
        field: ov.field,
    })
}
