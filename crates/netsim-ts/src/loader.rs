use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use netsim_core::{NetworkError, SnapshotIndex};
use polars::prelude::*;
#[cfg(feature = "parquet")]
use polars::prelude::ParquetReader;
use std::fs::File;
use std::path::Path;
use tracing::debug;

const LABEL_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Read one numeric column, in file order.
///
/// Empty cells are rejected rather than filled.
pub fn load_profile(path: &Path, column: &str) -> Result<Vec<f64>> {
    let df = read_frame(path)?;
    let values = numeric_column(&df, column)?;
    debug!(path = %path.display(), column, rows = values.len(), "loaded profile");
    Ok(values)
}

/// Read a value column aligned to a snapshot index through a label column.
///
/// The file's labels must equal the index labels exactly (same set, any row
/// order); the output follows the index order.
pub fn load_labelled_profile(
    path: &Path,
    label_column: &str,
    value_column: &str,
    index: &SnapshotIndex,
) -> Result<Vec<f64>> {
    let df = read_frame(path)?;
    let values = numeric_column(&df, value_column)?;
    let labels = df
        .column(label_column)
        .with_context(|| format!("missing label column '{label_column}'"))?
        .cast(&DataType::Utf8)
        .context("casting label column to text")?;
    let labels = labels.utf8()?;

    if labels.len() != index.len() {
        return Err(NetworkError::HorizonMismatch {
            expected: index.len(),
            actual: labels.len(),
        }
        .into());
    }

    let mut aligned = vec![None; index.len()];
    for (row, (label, value)) in labels.into_iter().zip(values).enumerate() {
        let text = label.ok_or_else(|| anyhow!("row {row}: empty snapshot label"))?;
        let snapshot = parse_label(text).with_context(|| format!("row {row}"))?;
        let position = index.position(&snapshot).ok_or_else(|| {
            NetworkError::InvalidHorizon(format!("label {snapshot} is not in the snapshot index"))
        })?;
        if aligned[position].replace(value).is_some() {
            bail!("row {row}: label {snapshot} appears twice");
        }
    }
    // Same length and no duplicates means every slot is filled.
    Ok(aligned.into_iter().flatten().collect())
}

fn parse_label(text: &str) -> Result<NaiveDateTime> {
    LABEL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text.trim(), format).ok())
        .ok_or_else(|| anyhow!("cannot parse snapshot label '{text}'"))
}

fn numeric_column(df: &DataFrame, column: &str) -> Result<Vec<f64>> {
    let series = df
        .column(column)
        .with_context(|| format!("missing value column '{column}'"))?
        .cast(&DataType::Float64)
        .with_context(|| format!("column '{column}' must be numeric"))?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| value.ok_or_else(|| anyhow!("row {row}: empty value in '{column}'")))
        .collect()
}

fn read_frame(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;

    match extension.as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => ParquetReader::new(&mut file)
            .finish()
            .context("reading Parquet file"),
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => CsvReader::new(&mut file)
            .has_header(true)
            .finish()
            .context("reading CSV file"),
        _ => Err(anyhow!(
            "unsupported file extension '{}'; use .csv or .parquet",
            extension
        )),
    }
}
