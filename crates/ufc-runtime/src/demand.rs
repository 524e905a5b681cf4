//! Reactor fuel requirements: first cores, reloads and their aggregation by
//! reactor type (for enrichment) and by country.

use std::collections::BTreeMap;
use ufc_core::{
    CountryDemandRecord, GenerationRatioBounds, InputSet, ReactorId, ReactorType, ReactorTypeId,
    ReactorUnit, ValidationError, HOURS_PER_YEAR,
};
use ufc_econ::{feed_and_swu, Assays, EnrichError};

/// Enriched product required by one reactor in one year.
#[derive(Clone, Debug, PartialEq)]
pub struct ReactorYearDemand {
    pub reactor: ReactorId,
    pub country: String,
    pub reactor_type: ReactorTypeId,
    pub year: i32,
    pub first_core_tu: f64,
    pub reload_tu: f64,
}

impl ReactorYearDemand {
    pub fn product_tu(&self) -> f64 {
        self.first_core_tu + self.reload_tu
    }
}

/// Observed-over-nameplate generation ratio for `year`, clamped to `bounds`,
/// or `None` when no generation figure is known for that year.
pub fn generation_ratio(
    unit: &ReactorUnit,
    year: i32,
    bounds: &GenerationRatioBounds,
) -> Option<f64> {
    let gwh = unit.generation_gwh.get(&year)?;
    let nameplate = unit.capacity_gwe * HOURS_PER_YEAR;
    if nameplate <= 0.0 {
        return None;
    }
    Some((gwh / nameplate).clamp(bounds.min, bounds.max))
}

/// Demand of one unit in one year, `None` while the unit is not operating.
///
/// The start year loads the first core only; every later operating year
/// takes a reload, scaled by the generation ratio when one is known.
///
/// Example:
/// // 1.0 GWe, 150 TU/GWe first core, 20 TU/GWe reload, starting 2000:
/// // 150 TU in 2000, then 20 TU a year.
pub fn reactor_demand(
    unit: &ReactorUnit,
    rtype: &ReactorType,
    year: i32,
    bounds: &GenerationRatioBounds,
) -> Option<ReactorYearDemand> {
    if !unit.is_active(year) {
        return None;
    }
    let (first_core_tu, reload_tu) = if unit.start_year == Some(year) {
        (unit.capacity_gwe * rtype.first_core_tu_per_gwe, 0.0)
    } else {
        let ratio = generation_ratio(unit, year, bounds).unwrap_or(1.0);
        (0.0, unit.capacity_gwe * rtype.reload_tu_per_gwe * ratio)
    };
    Some(ReactorYearDemand {
        reactor: unit.id.clone(),
        country: unit.country.clone(),
        reactor_type: unit.reactor_type.clone(),
        year,
        first_core_tu,
        reload_tu,
    })
}

/// All reactor demand of one year.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct YearDemand {
    pub year: i32,
    /// Per-reactor rows in fleet order.
    pub rows: Vec<ReactorYearDemand>,
}

impl YearDemand {
    /// Product demand grouped by reactor type.
    pub fn by_type(&self) -> BTreeMap<ReactorTypeId, f64> {
        let mut out = BTreeMap::new();
        for row in &self.rows {
            *out.entry(row.reactor_type.clone()).or_insert(0.0) += row.product_tu();
        }
        out
    }

    pub fn product_tu(&self) -> f64 {
        self.rows.iter().map(ReactorYearDemand::product_tu).sum()
    }
}

/// Collect the demand of every operating reactor in `year`.
pub fn year_demand(
    inputs: &InputSet,
    year: i32,
    bounds: &GenerationRatioBounds,
) -> Result<YearDemand, ValidationError> {
    let mut rows = Vec::new();
    for unit in &inputs.reactors {
        let rtype = inputs.reactor_type(&unit.reactor_type).ok_or_else(|| {
            ValidationError::UnknownReactorType {
                reactor: unit.id.0.clone(),
                reactor_type: unit.reactor_type.0.clone(),
            }
        })?;
        if let Some(row) = reactor_demand(unit, rtype, year, bounds) {
            rows.push(row);
        }
    }
    Ok(YearDemand { year, rows })
}

/// Roll reactor rows up to countries, converting product into feed and SWU
/// with each reactor type's assays for the year. Output is sorted by country.
pub fn country_records(
    demand: &YearDemand,
    assays: &BTreeMap<ReactorTypeId, Assays>,
) -> Result<Vec<CountryDemandRecord>, EnrichError> {
    let mut by_country: BTreeMap<&str, CountryDemandRecord> = BTreeMap::new();
    for row in &demand.rows {
        let rec = by_country
            .entry(row.country.as_str())
            .or_insert_with(|| CountryDemandRecord {
                country: row.country.clone(),
                year: demand.year,
                first_core_tu: 0.0,
                reload_tu: 0.0,
                product_tu: 0.0,
                feed_tu: 0.0,
                swu: 0.0,
            });
        rec.first_core_tu += row.first_core_tu;
        rec.reload_tu += row.reload_tu;
        rec.product_tu += row.product_tu();
        if let Some(a) = assays.get(&row.reactor_type) {
            let q = feed_and_swu(row.product_tu(), a)?;
            rec.feed_tu += q.feed_tu;
            rec.swu += q.swu;
        }
    }
    Ok(by_country.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ufc_core::YearSeries;

    fn pwr() -> ReactorType {
        ReactorType {
            id: ReactorTypeId("PWR".into()),
            first_core_tu_per_gwe: 150.0,
            reload_tu_per_gwe: 20.0,
            product_assay: 0.044,
            tails_assay: 0.003,
        }
    }

    fn unit(id: &str, country: &str, start: i32) -> ReactorUnit {
        ReactorUnit {
            id: ReactorId(id.into()),
            name: String::new(),
            country: country.into(),
            reactor_type: ReactorTypeId("PWR".into()),
            capacity_gwe: 1.0,
            start_year: Some(start),
            retirement_year: None,
            generation_gwh: YearSeries::new(),
        }
    }

    #[test]
    fn first_core_then_reloads() {
        let bounds = GenerationRatioBounds::default();
        let u = unit("R1", "FR", 2000);
        assert!(reactor_demand(&u, &pwr(), 1999, &bounds).is_none());
        let first = reactor_demand(&u, &pwr(), 2000, &bounds).unwrap();
        assert_eq!(first.product_tu(), 150.0);
        assert_eq!(first.reload_tu, 0.0);
        for year in 2001..2040 {
            let d = reactor_demand(&u, &pwr(), year, &bounds).unwrap();
            assert_eq!(d.product_tu(), 20.0);
            assert_eq!(d.first_core_tu, 0.0);
        }
    }

    #[test]
    fn retirement_is_inclusive() {
        let bounds = GenerationRatioBounds::default();
        let mut u = unit("R1", "FR", 2000);
        u.retirement_year = Some(2010);
        assert!(reactor_demand(&u, &pwr(), 2010, &bounds).is_some());
        assert!(reactor_demand(&u, &pwr(), 2011, &bounds).is_none());
    }

    #[test]
    fn generation_scales_reload_and_is_clamped() {
        let bounds = GenerationRatioBounds::default();
        let mut u = unit("R1", "FR", 2000);
        u.generation_gwh.insert(2005, 0.5 * 8760.0);
        u.generation_gwh.insert(2006, 3.0 * 8760.0);
        let half = reactor_demand(&u, &pwr(), 2005, &bounds).unwrap();
        assert!((half.reload_tu - 10.0).abs() < 1e-12);
        let capped = reactor_demand(&u, &pwr(), 2006, &bounds).unwrap();
        assert!((capped.reload_tu - 24.0).abs() < 1e-12);
    }

    #[test]
    fn countries_are_sorted_and_summed() {
        let bounds = GenerationRatioBounds::default();
        let rt = pwr();
        let rows = vec![
            reactor_demand(&unit("U1", "US", 2000), &rt, 2000, &bounds).unwrap(),
            reactor_demand(&unit("F1", "FR", 1990), &rt, 2000, &bounds).unwrap(),
            reactor_demand(&unit("F2", "FR", 1995), &rt, 2000, &bounds).unwrap(),
        ];
        let demand = YearDemand { year: 2000, rows };
        let mut assays = BTreeMap::new();
        assays.insert(rt.id.clone(), Assays::new(0.044, 0.0071, 0.003).unwrap());
        let recs = country_records(&demand, &assays).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].country, "FR");
        assert_eq!(recs[0].product_tu, 40.0);
        assert_eq!(recs[1].country, "US");
        assert_eq!(recs[1].first_core_tu, 150.0);
        assert!((recs[1].feed_tu - 1500.0).abs() < 1e-9);
        assert_eq!(demand.by_type()[&rt.id], 190.0);
    }

    proptest! {
        #[test]
        fn demand_is_never_negative(cap in 0.01f64..5.0, gwh in 0.0f64..1e5, year in 1990i32..2050) {
            let bounds = GenerationRatioBounds::default();
            let mut u = unit("R1", "FR", 1990);
            u.capacity_gwe = cap;
            u.generation_gwh.insert(year, gwh);
            let d = reactor_demand(&u, &pwr(), year, &bounds).unwrap();
            prop_assert!(d.product_tu() >= 0.0);
            prop_assert!(d.reload_tu <= cap * 20.0 * bounds.max + 1e-9);
        }
    }
}
