//! Primary and secondary supply for one year.

use std::collections::BTreeMap;
use tracing::warn;
use ufc_core::{
    CapacityTables, ProjectId, SecondaryKind, SecondarySupplyCategory, SupplyProject,
};

/// Primary supply after the capacity clamp.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimarySupply {
    /// Sum of project volumes before clamping.
    pub raw_tu: f64,
    pub delivered_tu: f64,
    /// Volume above the ceiling. Lost for good; later years never see it.
    pub unmet_tu: f64,
    pub ceiling_tu: Option<f64>,
    /// Delivered volume per project.
    pub by_project: BTreeMap<ProjectId, f64>,
}

impl PrimarySupply {
    pub fn capacity_exceeded(&self) -> bool {
        self.unmet_tu > 0.0
    }
}

/// Clamp project volumes to `ceiling`, cutting the costliest volume first.
///
/// `volumes` holds `(project, cost tier, volume)`. Projects are cut in
/// descending cost tier, ties in descending id, so the result does not depend
/// on input order.
///
/// Example:
/// // volumes 50 + 50 + 30 against a ceiling of 100 deliver 100, leave 30 unmet
pub fn clamp_to_ceiling(volumes: &[(ProjectId, u32, f64)], ceiling: Option<f64>) -> PrimarySupply {
    let raw_tu: f64 = volumes.iter().map(|(_, _, v)| v).sum();
    let mut by_project: BTreeMap<ProjectId, f64> = BTreeMap::new();
    for (id, _, v) in volumes {
        *by_project.entry(id.clone()).or_insert(0.0) += v;
    }

    let mut excess = match ceiling {
        Some(c) if raw_tu > c => raw_tu - c,
        _ => 0.0,
    };
    let unmet_tu = excess;
    if excess > 0.0 {
        let mut order: Vec<&(ProjectId, u32, f64)> = volumes.iter().collect();
        order.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        for (id, _, _) in order {
            if excess <= 0.0 {
                break;
            }
            if let Some(left) = by_project.get_mut(id) {
                let cut = excess.min(*left);
                *left -= cut;
                excess -= cut;
            }
        }
    }

    PrimarySupply {
        raw_tu,
        delivered_tu: raw_tu - unmet_tu,
        unmet_tu,
        ceiling_tu: ceiling,
        by_project,
    }
}

/// Primary supply of `year` from every project, clamped to the year's ceiling.
pub fn project_primary(
    projects: &[SupplyProject],
    capacity: &CapacityTables,
    year: i32,
) -> PrimarySupply {
    let volumes: Vec<(ProjectId, u32, f64)> = projects
        .iter()
        .map(|p| (p.id.clone(), p.cost_tier, p.volume_at(year)))
        .collect();
    let supply = clamp_to_ceiling(&volumes, capacity.primary_ceiling(year));
    if supply.capacity_exceeded() {
        warn!(
            year,
            raw_tu = supply.raw_tu,
            ceiling_tu = ?supply.ceiling_tu,
            unmet_tu = supply.unmet_tu,
            "primary supply exceeds capacity ceiling"
        );
    }
    supply
}

/// Signed secondary supply with a per-kind breakdown.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SecondarySupply {
    pub total_tu: f64,
    pub by_kind: BTreeMap<SecondaryKind, f64>,
}

pub fn project_secondary(categories: &[SecondarySupplyCategory], year: i32) -> SecondarySupply {
    let mut out = SecondarySupply::default();
    for c in categories {
        let v = c.signed_volume_at(year);
        out.total_tu += v;
        *out.by_kind.entry(c.kind).or_insert(0.0) += v;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ufc_core::{CategoryId, Trajectory, YearSeries};

    fn pid(s: &str) -> ProjectId {
        ProjectId(s.to_string())
    }

    #[test]
    fn clamps_130_to_100() {
        let v = vec![(pid("a"), 1, 50.0), (pid("b"), 2, 50.0), (pid("c"), 3, 30.0)];
        let s = clamp_to_ceiling(&v, Some(100.0));
        assert_eq!(s.raw_tu, 130.0);
        assert_eq!(s.delivered_tu, 100.0);
        assert_eq!(s.unmet_tu, 30.0);
        assert!(s.capacity_exceeded());
        assert_eq!(s.by_project[&pid("c")], 0.0);
        assert_eq!(s.by_project[&pid("b")], 50.0);
    }

    #[test]
    fn marginal_project_is_cut_partially_with_id_tiebreak() {
        let v = vec![(pid("a"), 2, 40.0), (pid("b"), 2, 40.0), (pid("c"), 1, 40.0)];
        let s = clamp_to_ceiling(&v, Some(100.0));
        assert_eq!(s.by_project[&pid("b")], 20.0);
        assert_eq!(s.by_project[&pid("a")], 40.0);
        assert_eq!(s.by_project[&pid("c")], 40.0);
    }

    #[test]
    fn no_ceiling_means_no_clamp() {
        let v = vec![(pid("a"), 1, 500.0)];
        let s = clamp_to_ceiling(&v, None);
        assert_eq!(s.delivered_tu, 500.0);
        assert!(!s.capacity_exceeded());
    }

    #[test]
    fn explicit_ceiling_wins_over_conversion() {
        let project = SupplyProject {
            id: pid("a"),
            name: String::new(),
            country: String::new(),
            trajectory: Trajectory::Flat {
                start_year: 2000,
                end_year: None,
                volume: 130.0,
            },
            cost_tier: 1,
            actuals: YearSeries::new(),
        };
        let mut cap = CapacityTables::default();
        cap.conversion_tu.insert(2020, 120.0);
        assert_eq!(project_primary(&[project.clone()], &cap, 2020).unmet_tu, 10.0);
        cap.primary_ceiling_tu.insert(2020, 100.0);
        assert_eq!(project_primary(&[project.clone()], &cap, 2020).unmet_tu, 30.0);
        assert_eq!(project_primary(&[project], &cap, 2021).unmet_tu, 0.0);
    }

    #[test]
    fn overfeed_reduces_secondary_supply() {
        let flat = |v: f64| Trajectory::Flat {
            start_year: 2000,
            end_year: None,
            volume: v,
        };
        let cats = vec![
            SecondarySupplyCategory {
                id: CategoryId("under".into()),
                kind: SecondaryKind::Underfeed,
                trajectory: flat(30.0),
                actuals: YearSeries::new(),
            },
            SecondarySupplyCategory {
                id: CategoryId("over".into()),
                kind: SecondaryKind::Overfeed,
                trajectory: flat(10.0),
                actuals: YearSeries::new(),
            },
        ];
        let s = project_secondary(&cats, 2010);
        assert_eq!(s.total_tu, 20.0);
        assert_eq!(s.by_kind[&SecondaryKind::Overfeed], -10.0);
    }

    proptest! {
        #[test]
        fn clamp_conserves_volume(
            vols in proptest::collection::vec((0u32..4, 0.0f64..500.0), 1..8),
            ceiling in 0.0f64..1500.0,
        ) {
            let v: Vec<(ProjectId, u32, f64)> = vols
                .iter()
                .enumerate()
                .map(|(i, (t, x))| (pid(&format!("p{i}")), *t, *x))
                .collect();
            let s = clamp_to_ceiling(&v, Some(ceiling));
            prop_assert!(s.delivered_tu <= ceiling + 1e-9);
            prop_assert!((s.delivered_tu + s.unmet_tu - s.raw_tu).abs() < 1e-9);
            let per_project: f64 = s.by_project.values().sum();
            prop_assert!((per_project - s.delivered_tu).abs() < 1e-6);
            prop_assert!(s.by_project.values().all(|x| *x >= 0.0));
        }
    }
}
