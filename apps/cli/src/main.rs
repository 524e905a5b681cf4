#![deny(warnings)]

//! Headless CLI: run one scenario (or all of them) over an input set and
//! write the balance panel.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use ufc_core::{validate_config, validate_inputs, InputSet, SimConfig, ValidationError};
use ufc_runtime::{
    run_batch, BalancePanel, BalanceSimulator, PriceModel, RegressionPriceModel, RunError,
};
use ufc_scenario::{ConfigurationError, ScenarioEngine, ScenarioSet};

#[derive(Debug, Default)]
struct Args {
    inputs: Option<PathBuf>,
    scenarios: Option<PathBuf>,
    scenario: Option<String>,
    all: bool,
    config: Option<PathBuf>,
    price_model: Option<PathBuf>,
    out: Option<PathBuf>,
    parquet: Option<PathBuf>,
    db: Option<String>,
}

const USAGE: &str = "usage: ufc run --inputs <file> --scenarios <file> (--scenario <name> | --all) \
[--config <file>] [--price-model <file>] [--out <json>] [--parquet <file>] [--db <sqlite url>]";

fn parse_args() -> Result<Args> {
    let mut it = std::env::args().skip(1);
    match it.next().as_deref() {
        Some("run") => {}
        _ => bail!(USAGE),
    }
    let mut args = Args::default();
    while let Some(arg) = it.next() {
        let mut value = || it.next().with_context(|| format!("{arg} needs a value"));
        match arg.as_str() {
            "--inputs" => args.inputs = Some(value()?.into()),
            "--scenarios" => args.scenarios = Some(value()?.into()),
            "--scenario" => args.scenario = Some(value()?),
            "--all" => args.all = true,
            "--config" => args.config = Some(value()?.into()),
            "--price-model" => args.price_model = Some(value()?.into()),
            "--out" => args.out = Some(value()?.into()),
            "--parquet" => args.parquet = Some(value()?.into()),
            "--db" => args.db = Some(value()?),
            other => bail!("unknown argument {other}\n{USAGE}"),
        }
    }
    if args.inputs.is_none() || args.scenarios.is_none() {
        bail!(USAGE);
    }
    if args.scenario.is_none() && !args.all {
        bail!(USAGE);
    }
    Ok(args)
}

fn load_inputs(path: &Path) -> Result<InputSet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading inputs {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing inputs {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: SimConfig = serde_yaml::from_str(&text)
        .map_err(|e| ConfigurationError::Parse(format!("{}: {e}", path.display())))?;
    validate_config(&config).map_err(|e| ConfigurationError::Invalid(e.to_string()))?;
    Ok(config)
}

fn load_price_model(path: Option<&Path>, config: &SimConfig) -> Result<Option<RegressionPriceModel>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading price model {}", path.display()))?;
    let regimes = config.regimes.keys().map(String::as_str);
    Ok(Some(RegressionPriceModel::from_yaml_str(&text, regimes)?))
}

fn summarize(panel: &BalancePanel) {
    let failures = panel.convergence_failures();
    let last = panel.records.last();
    println!(
        "{} | years: {} | final inventory: {:.0} tU | final balance: {:.0} tU | convergence failures: {}",
        panel.scenario,
        panel.records.len(),
        last.map(|r| r.inventory_tu).unwrap_or(0.0),
        last.map(|r| r.net_balance_tu).unwrap_or(0.0),
        failures.len()
    );
    if !failures.is_empty() {
        warn!(scenario = %panel.scenario, years = ?failures, "price feedback did not converge");
    }
}

fn store(url: &str, panel: &BalancePanel, snapshot: Option<Vec<u8>>) -> Result<i64> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pool = persistence::init_db(url).await?;
        Ok(persistence::save_run(&pool, panel, snapshot.as_deref()).await?)
    })
}

fn write_outputs(args: &Args, panel: &BalancePanel, snapshot: Option<Vec<u8>>) -> Result<()> {
    if let Some(out) = &args.out {
        persistence::write_json(panel, out)?;
    }
    if let Some(path) = &args.parquet {
        persistence::write_parquet(&panel.records, path)?;
    }
    if let Some(url) = &args.db {
        let run_id = store(url, panel, snapshot)?;
        println!("stored as run {run_id}");
    }
    Ok(())
}

fn with_suffix(path: &Path, scenario: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("panel");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{scenario}.{ext}"),
        None => format!("{stem}-{scenario}"),
    };
    path.with_file_name(name)
}

/// Summarizes and writes every successful panel of a batch. A failed
/// scenario is logged and does not stop the others; the first failure is
/// returned once the whole batch has been written.
fn write_batch(
    args: &Args,
    results: impl IntoIterator<Item = (String, Result<BalancePanel, RunError>)>,
) -> Result<bool> {
    let mut any_failed = false;
    let mut first_err: Option<anyhow::Error> = None;
    for (name, result) in results {
        let written = result.map_err(anyhow::Error::from).and_then(|panel| {
            summarize(&panel);
            any_failed |= !panel.convergence_failures().is_empty();
            let per = Args {
                out: args.out.as_deref().map(|p| with_suffix(p, &name)),
                parquet: args.parquet.as_deref().map(|p| with_suffix(p, &name)),
                db: args.db.clone(),
                ..Args::default()
            };
            write_outputs(&per, &panel, None)
        });
        if let Err(err) = written {
            error!(scenario = %name, "scenario failed: {err:#}");
            first_err.get_or_insert(err);
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(any_failed),
    }
}

/// Runs every scenario; returns true when any year failed to converge.
fn run(args: &Args) -> Result<bool> {
    let inputs_path = args.inputs.as_deref().context(USAGE)?;
    let scenarios_path = args.scenarios.as_deref().context(USAGE)?;
    let inputs = load_inputs(inputs_path)?;
    let scenarios = ScenarioSet::from_path(scenarios_path)?;
    let config = load_config(args.config.as_deref())?;
    let model = load_price_model(args.price_model.as_deref(), &config)?;
    let model_ref = model.as_ref().map(|m| m as &dyn PriceModel);

    if args.all {
        return write_batch(args, run_batch(&inputs, &scenarios, &config, model_ref));
    }

    let name = args.scenario.as_deref().context(USAGE)?;
    let scenario = scenarios.get(name)?;
    validate_inputs(&inputs).map_err(RunError::from)?;
    let effective = ScenarioEngine::new(&inputs).apply(name, scenario)?;
    let mut sim = BalanceSimulator::new(&effective, &config)?;
    if let Some(m) = model_ref {
        sim = sim.with_price_model(m);
    }
    let panel = sim.run(name)?;
    summarize(&panel);
    let snapshot = match &args.db {
        Some(_) => Some(persistence::InputSnapshot::new(name, &effective, &config)?.to_bytes()?),
        None => None,
    };
    write_outputs(args, &panel, snapshot)?;
    Ok(!panel.convergence_failures().is_empty())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<RunError>() {
        return match e {
            RunError::Configuration(_) => 2,
            RunError::DataValidation(_) => 3,
            RunError::InvalidAssay { .. } => 4,
            RunError::OutsideHorizon(_) | RunError::YearOrder { .. } => 1,
        };
    }
    if err.downcast_ref::<ConfigurationError>().is_some() {
        return 2;
    }
    if err.downcast_ref::<ValidationError>().is_some() {
        return 3;
    }
    1
}

fn main() -> ExitCode {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();
    info!(
        git_sha = env!("GIT_SHA"),
        build_date = env!("BUILD_DATE"),
        "ufc starting"
    );

    let result = parse_args().and_then(|args| run(&args));
    match result {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(5),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
