//! SQLite store for runs and their balance records.

use crate::PersistError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;
use ufc_core::{BalanceRecord, SimulationMode};
use ufc_runtime::BalancePanel;

/// Returns the default SQLite URL used for local run storage.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./runs/balance.db"
}

/// One stored run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub id: i64,
    pub scenario: String,
    pub created_at: DateTime<Utc>,
    pub years: i64,
    pub convergence_failures: i64,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scenario TEXT NOT NULL,
        created_at TEXT NOT NULL,
        years INTEGER NOT NULL,
        convergence_failures INTEGER NOT NULL,
        inputs_snapshot BLOB
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS balance_records (
        run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
        year INTEGER NOT NULL,
        mode TEXT NOT NULL,
        feed_tu REAL NOT NULL,
        total_supply_tu REAL NOT NULL,
        net_balance_tu REAL NOT NULL,
        inventory_tu REAL NOT NULL,
        record_json TEXT NOT NULL,
        PRIMARY KEY (run_id, year)
    )
    "#,
];

/// Open (creating if needed) the database at `url` and ensure the schema.
pub async fn init_db(url: &str) -> Result<SqlitePool, PersistError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);
    // an in-memory database exists per connection
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(&pool).await?;
    }
    Ok(pool)
}

/// Store a run and all of its records in one transaction; returns the run id.
pub async fn save_run(
    pool: &SqlitePool,
    panel: &BalancePanel,
    inputs_snapshot: Option<&[u8]>,
) -> Result<i64, PersistError> {
    let mut tx = pool.begin().await?;
    let run_id = sqlx::query(
        "INSERT INTO runs (scenario, created_at, years, convergence_failures, inputs_snapshot) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&panel.scenario)
    .bind(Utc::now().to_rfc3339())
    .bind(panel.records.len() as i64)
    .bind(panel.convergence_failures().len() as i64)
    .bind(inputs_snapshot)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for r in &panel.records {
        let mode = match r.mode {
            SimulationMode::Reconstruction => "reconstruction",
            SimulationMode::Projection => "projection",
        };
        sqlx::query(
            "INSERT INTO balance_records \
             (run_id, year, mode, feed_tu, total_supply_tu, net_balance_tu, inventory_tu, record_json) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(run_id)
        .bind(r.year)
        .bind(mode)
        .bind(r.feed_tu)
        .bind(r.total_supply_tu)
        .bind(r.net_balance_tu)
        .bind(r.inventory_tu)
        .bind(serde_json::to_string(r)?)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    info!(run_id, scenario = %panel.scenario, records = panel.records.len(), "run saved");
    Ok(run_id)
}

/// Records of a stored run, in year order.
pub async fn load_records(pool: &SqlitePool, run_id: i64) -> Result<Vec<BalanceRecord>, PersistError> {
    let rows = sqlx::query("SELECT record_json FROM balance_records WHERE run_id = ? ORDER BY year")
        .bind(run_id)
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| -> Result<BalanceRecord, PersistError> {
            let text: String = row.try_get("record_json")?;
            Ok(serde_json::from_str(&text)?)
        })
        .collect()
}

/// The stored inputs snapshot of a run, if one was saved.
pub async fn load_snapshot(pool: &SqlitePool, run_id: i64) -> Result<Option<Vec<u8>>, PersistError> {
    let row = sqlx::query("SELECT inputs_snapshot FROM runs WHERE id = ?")
        .bind(run_id)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(row.try_get("inputs_snapshot")?),
        None => Err(PersistError::Decode(format!("run {run_id} not found"))),
    }
}

/// All stored runs, newest first.
pub async fn list_runs(pool: &SqlitePool) -> Result<Vec<RunSummary>, PersistError> {
    let rows = sqlx::query(
        "SELECT id, scenario, created_at, years, convergence_failures FROM runs ORDER BY id DESC",
    )
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| -> Result<RunSummary, PersistError> {
            let created: String = row.try_get("created_at")?;
            let created_at = DateTime::parse_from_rfc3339(&created)
                .map_err(|e| PersistError::Decode(format!("created_at {created}: {e}")))?
                .with_timezone(&Utc);
            Ok(RunSummary {
                id: row.try_get("id")?,
                scenario: row.try_get("scenario")?,
                created_at,
                years: row.try_get("years")?,
                convergence_failures: row.try_get("convergence_failures")?,
            })
        })
        .collect()
}
