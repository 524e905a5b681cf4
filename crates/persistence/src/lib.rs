#![deny(warnings)]

//! Persistence layer: SQLite run store, Parquet/JSON panel export and
//! input snapshots.

use thiserror::Error;

pub mod export;
pub mod snapshot;
pub mod store;

pub use export::{records_to_batch, write_json, write_parquet};
pub use snapshot::InputSnapshot;
pub use store::{default_sqlite_url, init_db, list_runs, load_records, save_run, RunSummary};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] bincode::Error),
    #[error("corrupt stored value: {0}")]
    Decode(String),
}
