//! Panel export: JSON for the whole panel, Parquet for the balance records.

use crate::PersistError;
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int32Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rust_decimal::prelude::ToPrimitive;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use ufc_core::{BalanceRecord, SimulationMode, YearStatus};
use ufc_runtime::BalancePanel;

/// Write the full panel (records, country demand, features) as pretty JSON.
pub fn write_json(panel: &BalancePanel, path: &Path) -> Result<(), PersistError> {
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, panel)?;
    info!(path = %path.display(), scenario = %panel.scenario, "panel written as json");
    Ok(())
}

fn f64_col(records: &[BalanceRecord], get: impl Fn(&BalanceRecord) -> f64) -> ArrayRef {
    Arc::new(Float64Array::from(records.iter().map(get).collect::<Vec<_>>()))
}

fn opt_col(records: &[BalanceRecord], get: impl Fn(&BalanceRecord) -> Option<f64>) -> ArrayRef {
    Arc::new(Float64Array::from(records.iter().map(get).collect::<Vec<_>>()))
}

fn status_label(s: &YearStatus) -> &'static str {
    match s {
        YearStatus::Reconstructed => "reconstructed",
        YearStatus::Converged { .. } => "converged",
        YearStatus::ConvergenceFailed { .. } => "convergence_failed",
    }
}

/// Flatten balance records into one Arrow batch, one row per year.
pub fn records_to_batch(records: &[BalanceRecord]) -> Result<RecordBatch, PersistError> {
    let float = |name: &str| Field::new(name, DataType::Float64, false);
    let nullable = |name: &str| Field::new(name, DataType::Float64, true);
    let schema = Schema::new(vec![
        Field::new("year", DataType::Int32, false),
        Field::new("mode", DataType::Utf8, false),
        Field::new("status", DataType::Utf8, false),
        Field::new("fixed_point_iterations", DataType::UInt32, false),
        float("product_tu"),
        float("feed_tu"),
        float("swu"),
        float("tails_assay"),
        float("primary_supply_tu"),
        float("secondary_supply_tu"),
        float("total_supply_tu"),
        float("net_balance_tu"),
        float("policy_flow_tu"),
        float("inventory_tu"),
        float("shortage_tu"),
        float("overflow_tu"),
        float("unmet_primary_tu"),
        Field::new("capacity_exceeded", DataType::Boolean, false),
        nullable("conversion_tightness"),
        nullable("enrichment_tightness"),
        nullable("capacity_tightness"),
        nullable("balance_ratio"),
        nullable("inventory_years"),
        nullable("u3o8_usd_per_lb"),
        nullable("swu_usd_per_swu"),
        Field::new("tails_fallbacks", DataType::UInt32, false),
    ]);

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from(
            records.iter().map(|r| r.year).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            records
                .iter()
                .map(|r| match r.mode {
                    SimulationMode::Reconstruction => "reconstruction",
                    SimulationMode::Projection => "projection",
                })
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            records
                .iter()
                .map(|r| status_label(&r.status))
                .collect::<Vec<_>>(),
        )),
        Arc::new(UInt32Array::from(
            records
                .iter()
                .map(|r| match r.status {
                    YearStatus::Reconstructed => 0,
                    YearStatus::Converged { iterations }
                    | YearStatus::ConvergenceFailed { iterations, .. } => iterations,
                })
                .collect::<Vec<_>>(),
        )),
        f64_col(records, |r| r.product_tu),
        f64_col(records, |r| r.feed_tu),
        f64_col(records, |r| r.swu),
        f64_col(records, |r| r.tails_assay),
        f64_col(records, |r| r.primary_supply_tu),
        f64_col(records, |r| r.secondary_supply_tu),
        f64_col(records, |r| r.total_supply_tu),
        f64_col(records, |r| r.net_balance_tu),
        f64_col(records, |r| r.policy_flow_tu),
        f64_col(records, |r| r.inventory_tu),
        f64_col(records, |r| r.shortage_tu),
        f64_col(records, |r| r.overflow_tu),
        f64_col(records, |r| r.unmet_primary_tu),
        Arc::new(BooleanArray::from(
            records
                .iter()
                .map(|r| r.capacity_exceeded)
                .collect::<Vec<_>>(),
        )),
        opt_col(records, |r| r.conversion_tightness),
        opt_col(records, |r| r.enrichment_tightness),
        opt_col(records, |r| r.capacity_tightness),
        opt_col(records, |r| r.balance_ratio),
        opt_col(records, |r| r.inventory_years),
        opt_col(records, |r| r.price.and_then(|p| p.u3o8_usd_per_lb.to_f64())),
        opt_col(records, |r| r.price.and_then(|p| p.swu_usd_per_swu.to_f64())),
        Arc::new(UInt32Array::from(
            records.iter().map(|r| r.tails_fallbacks).collect::<Vec<_>>(),
        )),
    ];
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Write balance records to a Parquet file.
pub fn write_parquet(records: &[BalanceRecord], path: &Path) -> Result<(), PersistError> {
    let batch = records_to_batch(records)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    info!(path = %path.display(), rows = batch.num_rows(), "balance records written as parquet");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{panel, scratch_path};
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    #[test]
    fn batch_has_one_row_per_year() {
        let p = panel();
        let batch = records_to_batch(&p.records).unwrap();
        assert_eq!(batch.num_rows(), p.records.len());
        let years = batch
            .column_by_name("year")
            .unwrap()
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(years.value(0), p.records[0].year);
        let conv = batch.column_by_name("conversion_tightness").unwrap();
        assert_eq!(conv.null_count(), p.records.len());
    }

    #[test]
    fn parquet_file_reads_back() {
        let p = panel();
        let path = scratch_path("records.parquet");
        write_parquet(&p.records, &path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, p.records.len());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn json_panel_reads_back() {
        let p = panel();
        let path = scratch_path("panel.json");
        write_json(&p, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let back: BalancePanel = serde_json::from_str(&text).unwrap();
        assert_eq!(back, p);
        let _ = std::fs::remove_file(path);
    }
}
