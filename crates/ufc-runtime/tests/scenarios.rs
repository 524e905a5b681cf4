use std::path::PathBuf;
use ufc_core::{InputSet, SimConfig, SimulationMode, ValidationError};
use ufc_runtime::{run_scenario, BalancePanel, RegressionPriceModel, RunError};
use ufc_scenario::{ConfigurationError, ScenarioSet};

fn asset(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../assets")
        .join(rel)
}

fn load() -> (InputSet, ScenarioSet, SimConfig, RegressionPriceModel) {
    let inputs: InputSet =
        serde_yaml::from_str(&std::fs::read_to_string(asset("inputs/demo_inputs.yaml")).unwrap())
            .unwrap();
    let scenarios = ScenarioSet::from_path(asset("scenarios/reference.yaml")).unwrap();
    let config: SimConfig =
        serde_yaml::from_str(&std::fs::read_to_string(asset("config/default.yaml")).unwrap())
            .unwrap();
    let model = RegressionPriceModel::from_yaml_str(
        &std::fs::read_to_string(asset("config/price_model.yaml")).unwrap(),
        config.regimes.keys().map(String::as_str),
    )
    .unwrap();
    (inputs, scenarios, config, model)
}

fn run(name: &str) -> BalancePanel {
    let (inputs, scenarios, config, model) = load();
    run_scenario(
        &inputs,
        name,
        scenarios.get(name).unwrap(),
        &config,
        Some(&model),
    )
    .unwrap()
}

#[test]
fn baseline_covers_the_horizon_in_both_modes() {
    let panel = run("baseline");
    assert_eq!(panel.records.len(), 18);
    let years: Vec<i32> = panel.records.iter().map(|r| r.year).collect();
    assert!(years.windows(2).all(|w| w[1] == w[0] + 1));
    assert_eq!(panel.record(2023).unwrap().mode, SimulationMode::Reconstruction);
    assert_eq!(panel.record(2024).unwrap().mode, SimulationMode::Projection);
    for r in &panel.records {
        assert!(r.feed_tu >= r.product_tu);
        assert!(r.swu >= 0.0);
        assert!(r.inventory_tu >= 300.0);
        assert!(r.unmet_primary_tu >= 0.0);
        assert!(
            (r.total_supply_tu - r.primary_supply_tu - r.secondary_supply_tu).abs() < 1e-9
        );
    }
    let countries: Vec<(&str, i32)> = panel
        .country_demand
        .iter()
        .map(|c| (c.country.as_str(), c.year))
        .collect();
    let mut sorted = countries.clone();
    sorted.sort();
    assert_eq!(countries, sorted);
}

#[test]
fn same_scenario_twice_is_bit_identical() {
    let a = run("life_extension");
    let b = run("life_extension");
    assert_eq!(a, b);
    let a_json = serde_json::to_string(&a).unwrap();
    let b_json = serde_json::to_string(&b).unwrap();
    assert_eq!(a_json, b_json);
}

#[test]
fn mine_delay_moves_supply_later() {
    let base = run("baseline");
    let delayed = run("mine_delay");
    // the project starts ramping in 2026; delayed, nothing from it before 2029
    for year in 2026..2029 {
        assert!(
            delayed.record(year).unwrap().primary_supply_tu
                <= base.record(year).unwrap().primary_supply_tu + 1e-9
        );
    }
    assert!(
        delayed.record(2027).unwrap().primary_supply_tu
            < base.record(2027).unwrap().primary_supply_tu
    );
}

#[test]
fn unknown_scenario_is_reported() {
    let (_, scenarios, _, _) = load();
    assert!(matches!(
        scenarios.get("missing"),
        Err(ConfigurationError::UnknownScenario(_))
    ));
}

#[test]
fn physically_invalid_override_fails_the_run() {
    let (inputs, _, config, model) = load();
    let set = ScenarioSet::from_yaml_str(
        "bad:\n  overrides:\n    - entity: reactor_type\n      id: PWR\n      field: product_assay\n      transform: multiply\n      value: 0.1\n",
    )
    .unwrap();
    let err = run_scenario(&inputs, "bad", set.get("bad").unwrap(), &config, Some(&model))
        .unwrap_err();
    assert!(matches!(err, RunError::InvalidAssay { .. }));
}

#[test]
fn invalid_baseline_is_a_data_validation_error() {
    let (mut inputs, scenarios, config, model) = load();
    inputs.reactors[0].capacity_gwe = 0.0;
    for name in ["baseline", "mine_delay"] {
        let err = run_scenario(
            &inputs,
            name,
            scenarios.get(name).unwrap(),
            &config,
            Some(&model),
        )
        .unwrap_err();
        assert!(
            matches!(
                err,
                RunError::DataValidation(ValidationError::NonPositiveCapacity { .. })
            ),
            "{name}: {err:?}"
        );
    }
}
