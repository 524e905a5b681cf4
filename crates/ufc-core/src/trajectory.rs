//! Supply trajectory shapes shared by primary projects and secondary categories.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Volume-per-year shape of a supply source. The vocabulary is closed; every
/// variant answers [`Trajectory::volume_at`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Trajectory {
    /// Linear ramp from zero to `plateau_volume`, reached in `ramp_end_year`,
    /// then a constant plateau, then an optional linear decline to zero.
    RampPlateauDecline {
        ramp_start_year: i32,
        ramp_end_year: i32,
        plateau_volume: f64,
        #[serde(default)]
        decline_start_year: Option<i32>,
        /// Fraction of the plateau volume lost per year once declining.
        #[serde(default)]
        decline_rate: f64,
    },
    /// Constant volume over an inclusive band of years.
    Flat {
        start_year: i32,
        #[serde(default)]
        end_year: Option<i32>,
        volume: f64,
    },
    /// Explicit per-year volumes.
    Schedule { volumes: BTreeMap<i32, f64> },
}

impl Trajectory {
    /// Volume delivered in `year`, never negative.
    pub fn volume_at(&self, year: i32) -> f64 {
        let v = match self {
            Trajectory::RampPlateauDecline {
                ramp_start_year,
                ramp_end_year,
                plateau_volume,
                decline_start_year,
                decline_rate,
            } => {
                if year < *ramp_start_year {
                    0.0
                } else if year < *ramp_end_year {
                    let span = (*ramp_end_year - *ramp_start_year + 1) as f64;
                    let done = (year - *ramp_start_year + 1) as f64;
                    plateau_volume * done / span
                } else {
                    match decline_start_year {
                        Some(ds) if year >= *ds => {
                            let elapsed = (year - *ds + 1) as f64;
                            plateau_volume * (1.0 - decline_rate * elapsed).max(0.0)
                        }
                        _ => *plateau_volume,
                    }
                }
            }
            Trajectory::Flat {
                start_year,
                end_year,
                volume,
            } => {
                let after_start = year >= *start_year;
                let before_end = end_year.map_or(true, |e| year <= e);
                if after_start && before_end {
                    *volume
                } else {
                    0.0
                }
            }
            Trajectory::Schedule { volumes } => volumes.get(&year).copied().unwrap_or(0.0),
        };
        v.max(0.0)
    }

    /// First year the trajectory can deliver anything.
    pub fn start_year(&self) -> Option<i32> {
        match self {
            Trajectory::RampPlateauDecline {
                ramp_start_year, ..
            } => Some(*ramp_start_year),
            Trajectory::Flat { start_year, .. } => Some(*start_year),
            Trajectory::Schedule { volumes } => volumes.keys().next().copied(),
        }
    }

    /// Every year the shape is anchored on.
    pub fn milestone_years(&self) -> impl Iterator<Item = i32> {
        let fixed: Vec<i32> = match self {
            Trajectory::RampPlateauDecline {
                ramp_start_year,
                ramp_end_year,
                decline_start_year,
                ..
            } => [Some(*ramp_start_year), Some(*ramp_end_year), *decline_start_year]
                .into_iter()
                .flatten()
                .collect(),
            Trajectory::Flat {
                start_year,
                end_year,
                ..
            } => [Some(*start_year), *end_year].into_iter().flatten().collect(),
            Trajectory::Schedule { volumes } => volumes.keys().copied().collect(),
        };
        fixed.into_iter()
    }

    /// The same shape moved `years` later (negative moves it earlier). Every
    /// milestone year moves, so durations are preserved. Years saturate at the
    /// `i32` bounds.
    pub fn shifted(&self, years: i32) -> Trajectory {
        match self {
            Trajectory::RampPlateauDecline {
                ramp_start_year,
                ramp_end_year,
                plateau_volume,
                decline_start_year,
                decline_rate,
            } => Trajectory::RampPlateauDecline {
                ramp_start_year: ramp_start_year.saturating_add(years),
                ramp_end_year: ramp_end_year.saturating_add(years),
                plateau_volume: *plateau_volume,
                decline_start_year: decline_start_year.map(|d| d.saturating_add(years)),
                decline_rate: *decline_rate,
            },
            Trajectory::Flat {
                start_year,
                end_year,
                volume,
            } => Trajectory::Flat {
                start_year: start_year.saturating_add(years),
                end_year: end_year.map(|e| e.saturating_add(years)),
                volume: *volume,
            },
            Trajectory::Schedule { volumes } => Trajectory::Schedule {
                volumes: volumes.iter().map(|(y, v)| (y.saturating_add(years), *v)).collect(),
            },
        }
    }

    /// Mutable access to the steady-state volume, when the shape has one.
    pub fn plateau_volume_mut(&mut self) -> Option<&mut f64> {
        match self {
            Trajectory::RampPlateauDecline { plateau_volume, .. } => Some(plateau_volume),
            Trajectory::Flat { volume, .. } => Some(volume),
            Trajectory::Schedule { .. } => None,
        }
    }

    /// Mutable access to the decline rate, when the shape has one.
    pub fn decline_rate_mut(&mut self) -> Option<&mut f64> {
        match self {
            Trajectory::RampPlateauDecline { decline_rate, .. } => Some(decline_rate),
            _ => None,
        }
    }

    /// Check the shape parameters, returning a human-readable reason on failure.
    pub fn check(&self) -> Result<(), String> {
        match self {
            Trajectory::RampPlateauDecline {
                ramp_start_year,
                ramp_end_year,
                plateau_volume,
                decline_start_year,
                decline_rate,
            } => {
                if ramp_end_year < ramp_start_year {
                    return Err(format!(
                        "ramp ends in {ramp_end_year} before it starts in {ramp_start_year}"
                    ));
                }
                if !plateau_volume.is_finite() || *plateau_volume < 0.0 {
                    return Err("plateau volume must be finite and >= 0".into());
                }
                if !decline_rate.is_finite() || *decline_rate < 0.0 {
                    return Err("decline rate must be finite and >= 0".into());
                }
                if let Some(ds) = decline_start_year {
                    if ds < ramp_end_year {
                        return Err(format!("decline starts in {ds} before the ramp ends"));
                    }
                }
                Ok(())
            }
            Trajectory::Flat {
                start_year,
                end_year,
                volume,
            } => {
                if let Some(e) = end_year {
                    if e < start_year {
                        return Err(format!("band ends in {e} before it starts in {start_year}"));
                    }
                }
                if !volume.is_finite() || *volume < 0.0 {
                    return Err("volume must be finite and >= 0".into());
                }
                Ok(())
            }
            Trajectory::Schedule { volumes } => {
                if volumes.values().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err("scheduled volumes must be finite and >= 0".into());
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mine() -> Trajectory {
        Trajectory::RampPlateauDecline {
            ramp_start_year: 2025,
            ramp_end_year: 2028,
            plateau_volume: 4000.0,
            decline_start_year: Some(2035),
            decline_rate: 0.25,
        }
    }

    #[test]
    fn ramp_reaches_plateau_at_ramp_end() {
        let t = mine();
        assert_eq!(t.volume_at(2024), 0.0);
        assert_eq!(t.volume_at(2025), 1000.0);
        assert_eq!(t.volume_at(2027), 3000.0);
        assert_eq!(t.volume_at(2028), 4000.0);
        assert_eq!(t.volume_at(2034), 4000.0);
    }

    #[test]
    fn decline_reaches_zero_and_stays_there() {
        let t = mine();
        assert_eq!(t.volume_at(2035), 3000.0);
        assert_eq!(t.volume_at(2037), 1000.0);
        assert_eq!(t.volume_at(2038), 0.0);
        assert_eq!(t.volume_at(2060), 0.0);
    }

    #[test]
    fn flat_band_is_inclusive() {
        let t = Trajectory::Flat {
            start_year: 2020,
            end_year: Some(2022),
            volume: 50.0,
        };
        assert_eq!(t.volume_at(2019), 0.0);
        assert_eq!(t.volume_at(2020), 50.0);
        assert_eq!(t.volume_at(2022), 50.0);
        assert_eq!(t.volume_at(2023), 0.0);
    }

    #[test]
    fn inverted_ramp_is_rejected() {
        let t = Trajectory::RampPlateauDecline {
            ramp_start_year: 2030,
            ramp_end_year: 2029,
            plateau_volume: 1.0,
            decline_start_year: None,
            decline_rate: 0.0,
        };
        assert!(t.check().is_err());
    }

    #[test]
    fn yaml_shape_tag() {
        let text = "shape: flat\nstart_year: 2020\nvolume: 12.5\n";
        let t: Trajectory = serde_yaml::from_str(text).unwrap();
        assert_eq!(t.volume_at(2040), 12.5);
    }

    proptest! {
        #[test]
        fn shift_moves_every_year(shift in -10i32..10, year in 2000i32..2080) {
            let t = mine();
            let s = t.shifted(shift);
            prop_assert_eq!(s.volume_at(year + shift), t.volume_at(year));
        }

        #[test]
        fn never_negative(year in 1990i32..2100, rate in 0.0f64..2.0) {
            let t = Trajectory::RampPlateauDecline {
                ramp_start_year: 2000,
                ramp_end_year: 2005,
                plateau_volume: 10.0,
                decline_start_year: Some(2010),
                decline_rate: rate,
            };
            prop_assert!(t.volume_at(year) >= 0.0);
        }
    }
}
