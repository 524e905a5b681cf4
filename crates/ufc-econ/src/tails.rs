//! Tails-assay economics: cost of one unit of product and the bounded
//! golden-section search for its minimum.

use crate::enrichment::{check_assays, feed_per_product, swu_per_product, Assays};
use crate::EnrichError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;
use ufc_core::{PriceSignal, TailsSearch, LB_U3O8_PER_KGU};

/// Where a year's tails assay comes from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum TailsPolicy {
    /// Use the given assay as-is (historical reconstruction).
    Fixed(f64),
    /// Minimise unit cost against the given prices.
    Optimize(PriceSignal),
}

/// Result of a tails optimisation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TailsOptimum {
    pub tails_assay: f64,
    /// Feed plus enrichment cost in USD per TU of product.
    pub unit_cost_usd: f64,
    pub iterations: u32,
}

fn price_f64(d: Decimal) -> Result<f64, EnrichError> {
    let v = d.to_f64().ok_or(EnrichError::InvalidPrice)?;
    if !(v.is_finite() && v > 0.0) {
        return Err(EnrichError::InvalidPrice);
    }
    Ok(v)
}

// USD per TU of feed and per tSWU.
fn prices_per_tonne(price: &PriceSignal) -> Result<(f64, f64), EnrichError> {
    let u = price_f64(price.u3o8_usd_per_lb)?;
    let s = price_f64(price.swu_usd_per_swu)?;
    Ok((u * LB_U3O8_PER_KGU * 1000.0, s * 1000.0))
}

fn cost_at(a: &Assays, u_per_t: f64, s_per_t: f64) -> f64 {
    feed_per_product(a) * u_per_t + swu_per_product(a) * s_per_t
}

/// Feed plus enrichment cost of one TU of product, in USD.
pub fn unit_cost(a: &Assays, price: &PriceSignal) -> Result<f64, EnrichError> {
    check_assays(a.product, a.feed, a.tails)?;
    let (u, s) = prices_per_tonne(price)?;
    Ok(cost_at(a, u, s))
}

/// Tails assay minimising `feed(t) * p_U3O8 + SWU(t) * p_SWU` over the
/// admissible interval `[min_tails, feed_assay * max_fraction_of_feed]`.
///
/// The cost is convex in the tails assay on that interval, so a golden-section
/// search converges; it stops once the bracket width is within the relative
/// tolerance of its midpoint.
///
/// Example:
/// let price = PriceSignal { u3o8_usd_per_lb: Decimal::new(80, 0), swu_usd_per_swu: Decimal::new(160, 0) };
/// let opt = optimize_tails(0.044, 0.0071, &price, &TailsSearch::default()).unwrap();
/// // opt.tails_assay ~= 0.00199
pub fn optimize_tails(
    product_assay: f64,
    feed_assay: f64,
    price: &PriceSignal,
    search: &TailsSearch,
) -> Result<TailsOptimum, EnrichError> {
    let lo = search.min_tails;
    let hi = feed_assay * search.max_fraction_of_feed;
    check_assays(product_assay, feed_assay, lo)?;
    if !(hi > lo) {
        return Err(EnrichError::InvalidAssay {
            product: product_assay,
            feed: feed_assay,
            tails: hi,
        });
    }
    let (u, s) = prices_per_tonne(price)?;
    let cost = |t: f64| {
        let a = Assays {
            product: product_assay,
            feed: feed_assay,
            tails: t,
        };
        cost_at(&a, u, s)
    };

    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = (lo, hi);
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = cost(c);
    let mut fd = cost(d);
    let converged = |a: f64, b: f64| (b - a) <= search.tolerance * 0.5 * (a + b);

    let mut iterations = 0u32;
    while !converged(a, b) {
        if iterations >= search.max_iterations {
            return Err(EnrichError::Convergence {
                iterations,
                width: b - a,
            });
        }
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = cost(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = cost(d);
        }
        iterations += 1;
    }

    let tails_assay = 0.5 * (a + b);
    trace!(product_assay, tails_assay, iterations, "tails optimised");
    Ok(TailsOptimum {
        tails_assay,
        unit_cost_usd: cost(tails_assay),
        iterations,
    })
}

/// Resolve a policy into a tails assay for the given product and feed assays.
pub fn resolve_tails(
    policy: &TailsPolicy,
    product_assay: f64,
    feed_assay: f64,
    search: &TailsSearch,
) -> Result<f64, EnrichError> {
    match policy {
        TailsPolicy::Fixed(t) => {
            check_assays(product_assay, feed_assay, *t)?;
            Ok(*t)
        }
        TailsPolicy::Optimize(price) => {
            optimize_tails(product_assay, feed_assay, price, search).map(|o| o.tails_assay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn price(u: i64, s: i64) -> PriceSignal {
        PriceSignal {
            u3o8_usd_per_lb: Decimal::new(u, 0),
            swu_usd_per_swu: Decimal::new(s, 0),
        }
    }

    fn grid_minimum(xp: f64, xf: f64, p: &PriceSignal, search: &TailsSearch) -> f64 {
        let lo = search.min_tails;
        let hi = xf * search.max_fraction_of_feed;
        let n = 100_000;
        let mut best = (f64::INFINITY, lo);
        for i in 0..=n {
            let t = lo + (hi - lo) * i as f64 / n as f64;
            let c = unit_cost(&Assays { product: xp, feed: xf, tails: t }, p).unwrap();
            if c < best.0 {
                best = (c, t);
            }
        }
        best.1
    }

    #[test]
    fn matches_dense_grid() {
        let search = TailsSearch::default();
        for (u, s) in [(80, 160), (50, 150), (150, 50), (20, 200)] {
            let p = price(u, s);
            let opt = optimize_tails(0.044, 0.0071, &p, &search).unwrap();
            let grid = grid_minimum(0.044, 0.0071, &p, &search);
            assert!(
                (opt.tails_assay - grid).abs() < 1e-6,
                "u={u} s={s}: golden {} vs grid {grid}",
                opt.tails_assay
            );
            assert!(opt.iterations <= search.max_iterations);
        }
    }

    #[test]
    fn reference_optimum() {
        let opt = optimize_tails(0.044, 0.0071, &price(80, 160), &TailsSearch::default()).unwrap();
        assert!((opt.tails_assay - 0.001993).abs() < 2e-6, "{}", opt.tails_assay);
    }

    #[test]
    fn expensive_uranium_pushes_tails_to_lower_bound() {
        let search = TailsSearch::default();
        let opt = optimize_tails(0.044, 0.0071, &price(1000, 1), &search).unwrap();
        assert!((opt.tails_assay - search.min_tails).abs() < 1e-8);
    }

    #[test]
    fn iteration_cap_reports_convergence_error() {
        let search = TailsSearch {
            max_iterations: 5,
            ..TailsSearch::default()
        };
        let err = optimize_tails(0.044, 0.0071, &price(80, 160), &search).unwrap_err();
        assert!(matches!(err, EnrichError::Convergence { iterations: 5, .. }));
    }

    #[test]
    fn invalid_inputs() {
        let search = TailsSearch::default();
        assert!(matches!(
            optimize_tails(0.005, 0.0071, &price(80, 160), &search),
            Err(EnrichError::InvalidAssay { .. })
        ));
        assert_eq!(
            optimize_tails(0.044, 0.0071, &price(0, 160), &search),
            Err(EnrichError::InvalidPrice)
        );
    }

    #[test]
    fn fixed_policy_passes_through() {
        let search = TailsSearch::default();
        let t = resolve_tails(&TailsPolicy::Fixed(0.0025), 0.045, 0.00711, &search).unwrap();
        assert_eq!(t, 0.0025);
        assert!(resolve_tails(&TailsPolicy::Fixed(0.008), 0.045, 0.00711, &search).is_err());
    }

    proptest! {
        #[test]
        fn optimisation_is_idempotent(u in 10i64..300, s in 30i64..300, xp in 0.02f64..0.2) {
            let search = TailsSearch::default();
            let p = price(u, s);
            let first = optimize_tails(xp, 0.00711, &p, &search).unwrap();
            for _ in 0..3 {
                let again = optimize_tails(xp, 0.00711, &p, &search).unwrap();
                prop_assert_eq!(again.tails_assay, first.tails_assay);
            }
        }

        #[test]
        fn dearer_uranium_lowers_tails(u in 10i64..200, s in 30i64..300) {
            let search = TailsSearch::default();
            let cheap = optimize_tails(0.045, 0.00711, &price(u, s), &search).unwrap();
            let dear = optimize_tails(0.045, 0.00711, &price(u * 2, s), &search).unwrap();
            prop_assert!(dear.tails_assay <= cheap.tails_assay + 1e-8);
        }
    }
}
