//! Export of a stored evaluation result.
//!
//! Static tables are written one file per component kind, series in long
//! form (`id, attribute, snapshot, value`) so that withheld snapshots stay
//! visible as empty values.

use crate::csv_folder::{format_float, format_snapshot};
use anyhow::{Context, Result};
use netsim_core::{ComponentKind, EvaluationResult, Network, ResultSeries, Snapshot, StaticTable};
use std::fs;
use std::path::Path;
use tracing::info;

/// Write the stored result of `network` into `dir` as CSV files.
pub fn export_result_csv(network: &Network, dir: &Path) -> Result<()> {
    let result = network.result()?;
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    write_summary(result, &dir.join("summary.csv"))?;
    for kind in ComponentKind::ALL {
        let path = dir.join(format!("{}.csv", kind.table_name()));
        write_static(result.static_table(kind), &path)?;
    }
    write_static(result.node_table(), &dir.join("buses.csv"))?;
    write_series(result.iter_series(), &result.snapshots, &dir.join("series.csv"))?;
    write_series(
        result.iter_node_series(),
        &result.snapshots,
        &dir.join("node_series.csv"),
    )?;

    info!(dir = %dir.display(), analysis = %result.analysis, "exported result");
    Ok(())
}

fn write_summary(result: &EvaluationResult, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["analysis", "revision", "objective", "snapshots", "solved"])?;
    writer.write_record([
        result.analysis.to_string(),
        result.revision.to_string(),
        result.objective.map(format_float).unwrap_or_default(),
        result.snapshots.len().to_string(),
        result.solved_snapshots().to_string(),
    ])?;
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

fn write_static(table: &StaticTable, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec!["id"];
    header.extend(table.columns().iter().map(String::as_str));
    writer.write_record(&header)?;
    for id in table.row_ids() {
        let mut row = vec![id.to_string()];
        row.extend(
            table
                .columns()
                .iter()
                .map(|column| table.get(id, column).map(format_float).unwrap_or_default()),
        );
        writer
            .write_record(&row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

fn write_series<'a>(
    series: impl Iterator<Item = (&'a str, &'a str, &'a ResultSeries)>,
    snapshots: &[Snapshot],
    path: &Path,
) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["id", "attribute", "snapshot", "value"])?;
    for (id, attribute, values) in series {
        for (snapshot, value) in snapshots.iter().zip(values) {
            writer.write_record([
                id.to_string(),
                attribute.to_string(),
                format_snapshot(snapshot),
                value.map(format_float).unwrap_or_default(),
            ])?;
        }
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

/// Write the stored result of `network` into `dir` as Parquet files, one per
/// table, with the same layout as [`export_result_csv`].
#[cfg(feature = "parquet")]
pub fn export_result_parquet(network: &Network, dir: &Path) -> Result<()> {
    use polars::prelude::{DataFrame, NamedFrom, ParquetWriter, Series};

    let result = network.result()?;
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let write = |name: &str, mut df: DataFrame| -> Result<()> {
        let path = dir.join(format!("{name}.parquet"));
        let mut file =
            fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        ParquetWriter::new(&mut file)
            .finish(&mut df)
            .with_context(|| format!("writing table {name}"))?;
        Ok(())
    };

    let static_frame = |table: &StaticTable| -> Result<DataFrame> {
        let ids: Vec<&str> = table.row_ids().collect();
        let mut columns = vec![Series::new("id", ids.clone())];
        for column in table.columns() {
            let values: Vec<Option<f64>> = ids.iter().map(|id| table.get(id, column)).collect();
            columns.push(Series::new(column.as_str(), values));
        }
        Ok(DataFrame::new(columns)?)
    };

    let series_frame = |entries: Vec<(&str, &str, &ResultSeries)>| -> Result<DataFrame> {
        let (mut ids, mut attributes, mut labels, mut values) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for (id, attribute, series) in entries {
            for (snapshot, value) in result.snapshots.iter().zip(series) {
                ids.push(id.to_string());
                attributes.push(attribute.to_string());
                labels.push(format_snapshot(snapshot));
                values.push(*value);
            }
        }
        Ok(DataFrame::new(vec![
            Series::new("id", ids),
            Series::new("attribute", attributes),
            Series::new("snapshot", labels),
            Series::new("value", values),
        ])?)
    };

    let summary = DataFrame::new(vec![
        Series::new("analysis", vec![result.analysis.to_string()]),
        Series::new("revision", vec![result.revision as i64]),
        Series::new("objective", vec![result.objective]),
        Series::new("snapshots", vec![result.snapshots.len() as i64]),
        Series::new("solved", vec![result.solved_snapshots() as i64]),
    ])?;
    write("summary", summary)?;
    for kind in ComponentKind::ALL {
        write(kind.table_name(), static_frame(result.static_table(kind))?)?;
    }
    write("buses", static_frame(result.node_table())?)?;
    write("series", series_frame(result.iter_series().collect())?)?;
    write("node_series", series_frame(result.iter_node_series().collect())?)?;

    info!(dir = %dir.display(), analysis = %result.analysis, "exported result");
    Ok(())
}
