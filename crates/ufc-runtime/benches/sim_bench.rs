use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use ufc_core::{
    CapacityTables, Horizon, InputSet, InventoryPool, InventoryState, PoolId, PriceSignal,
    ProjectId, ReactorId, ReactorType, ReactorTypeId, ReactorUnit, SimConfig, SupplyProject,
    Trajectory, YearSeries,
};
use ufc_runtime::{BalanceSimulator, ConstantPrice};

fn synthetic_inputs(reactors: usize, projects: usize, seed: u64) -> InputSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let types = ["PWR", "BWR"];
    InputSet {
        horizon: Horizon {
            start_year: 2010,
            end_year: 2050,
        },
        reactor_types: types
            .iter()
            .map(|t| ReactorType {
                id: ReactorTypeId(t.to_string()),
                first_core_tu_per_gwe: 150.0,
                reload_tu_per_gwe: 20.0,
                product_assay: 0.044,
                tails_assay: 0.0025,
            })
            .collect(),
        reactors: (0..reactors)
            .map(|i| {
                let start = rng.gen_range(1970..2045);
                ReactorUnit {
                    id: ReactorId(format!("R{i}")),
                    name: String::new(),
                    country: format!("C{}", i % 30),
                    reactor_type: ReactorTypeId(types[i % 2].to_string()),
                    capacity_gwe: rng.gen_range(0.4..1.7),
                    start_year: Some(start),
                    retirement_year: Some(start + rng.gen_range(30..70)),
                    generation_gwh: YearSeries::new(),
                }
            })
            .collect(),
        supply_projects: (0..projects)
            .map(|i| {
                let start = rng.gen_range(1990..2040);
                SupplyProject {
                    id: ProjectId(format!("P{i}")),
                    name: String::new(),
                    country: String::new(),
                    trajectory: Trajectory::RampPlateauDecline {
                        ramp_start_year: start,
                        ramp_end_year: start + 3,
                        plateau_volume: rng.gen_range(500.0..5000.0),
                        decline_start_year: Some(start + 20),
                        decline_rate: 0.1,
                    },
                    cost_tier: rng.gen_range(1..5),
                    actuals: YearSeries::new(),
                }
            })
            .collect(),
        secondary_supply: vec![],
        inventory_pools: vec![InventoryPool {
            id: PoolId("global".into()),
            share: 1.0,
            initial: InventoryState {
                volume: 100_000.0,
                floor: 10_000.0,
                ceiling: None,
            },
        }],
        capacity: CapacityTables::default(),
        observed_prices: BTreeMap::new(),
        observed_tails: YearSeries::new(),
        policy_flows: YearSeries::new(),
    }
}

fn bench_runs(c: &mut Criterion) {
    let inputs = synthetic_inputs(450, 60, 42);
    let config = SimConfig::default();
    let model = ConstantPrice(PriceSignal {
        u3o8_usd_per_lb: Decimal::new(80, 0),
        swu_usd_per_swu: Decimal::new(160, 0),
    });

    c.bench_function("reconstruct_41y_450_reactors", |b| {
        b.iter(|| {
            let sim = BalanceSimulator::new(&inputs, &config).unwrap();
            let _ = black_box(sim.run("bench"));
        })
    });
    c.bench_function("project_41y_450_reactors", |b| {
        b.iter(|| {
            let sim = BalanceSimulator::new(&inputs, &config)
                .unwrap()
                .with_price_model(&model);
            let _ = black_box(sim.run("bench"));
        })
    });
}

criterion_group!(benches, bench_runs);
criterion_main!(benches);
