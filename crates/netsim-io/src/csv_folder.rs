//! Folder-of-CSV model format.
//!
//! ```text
//! network.csv              name, format_version
//! snapshots.csv            snapshot, weighting
//! buses.csv                id, <bus attributes>
//! generators.csv ...       id, bus | bus0, bus1, <attributes>, extension.<field>
//! generators-p_max_pu.csv  snapshot, <component id>...
//! ```
//!
//! Columns come from the serialized attribute structs, so new attributes
//! show up without touching this module. Empty cells mean "unset".

use crate::error::FormatError;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use netsim_core::{
    BusParams, Component, ComponentId, ComponentKind, ComponentParams, Extension, Network,
    NetworkError, Snapshot, SnapshotIndex,
};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const FORMAT_VERSION: &str = "1";
const SNAPSHOT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const EXTENSION_PREFIX: &str = "extension.";

/// Write `network` (definition only, no results) into `dir`.
///
/// Series files left over from an earlier export into the same folder are
/// removed first.
pub fn export_csv_folder(network: &Network, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    remove_stale_series(dir)?;

    write_rows(
        &dir.join("network.csv"),
        &["name".to_string(), "format_version".to_string()],
        [vec![network.name().to_string(), FORMAT_VERSION.to_string()]],
    )?;

    if let Some(index) = network.snapshots() {
        let rows = index
            .iter()
            .map(|(t, snapshot)| vec![format_snapshot(snapshot), format_float(index.weight(t))]);
        write_rows(
            &dir.join("snapshots.csv"),
            &["snapshot".to_string(), "weighting".to_string()],
            rows,
        )?;
    }

    let bus_fields = fields(&BusParams::default())?;
    let mut header = vec!["id".to_string()];
    header.extend(bus_fields.keys().cloned());
    let mut rows = Vec::with_capacity(network.nodes().len());
    for bus in network.nodes() {
        let values = fields(&bus.params)?;
        let mut row = vec![bus.id.to_string()];
        row.extend(bus_fields.keys().map(|key| to_cell(values.get(key))));
        rows.push(row);
    }
    write_rows(&dir.join("buses.csv"), &header, rows)?;

    for kind in ComponentKind::ALL {
        let layout = TableLayout::new(kind)?;
        let mut rows = Vec::new();
        for component in network.components_of(kind) {
            rows.push(layout.row(component)?);
        }
        write_rows(&dir.join(layout.file_name()), &layout.header(), rows)?;
    }

    let mut grouped: BTreeMap<(ComponentKind, &str), Vec<(&ComponentId, &[f64])>> =
        BTreeMap::new();
    for (id, attribute, values) in network.iter_time_series() {
        if let Some(component) = network.component(id.as_str()) {
            grouped
                .entry((component.kind(), attribute))
                .or_default()
                .push((id, values));
        }
    }
    if let Some(index) = network.snapshots() {
        for ((kind, attribute), columns) in &grouped {
            let mut header = vec!["snapshot".to_string()];
            header.extend(columns.iter().map(|(id, _)| id.to_string()));
            let rows = index.iter().map(|(t, snapshot)| {
                let mut row = vec![format_snapshot(snapshot)];
                row.extend(columns.iter().map(|(_, values)| format_float(values[t])));
                row
            });
            let name = format!("{}-{attribute}.csv", kind.table_name());
            write_rows(&dir.join(name), &header, rows)?;
        }
    }

    info!(
        dir = %dir.display(),
        buses = network.nodes().len(),
        components = network.components().len(),
        series = grouped.values().map(Vec::len).sum::<usize>(),
        "exported network"
    );
    Ok(())
}

/// Rebuild a network from a folder written by [`export_csv_folder`].
///
/// Everything goes through the builder, so the same checks apply as for a
/// hand-built model. On error nothing is returned.
pub fn import_csv_folder(dir: &Path) -> Result<Network> {
    let meta = Table::read(&dir.join("network.csv"))?;
    let mut network = Network::new();
    if let Some(row) = meta.rows.first() {
        if let Some(version) = meta.optional(row, "format_version") {
            if version != FORMAT_VERSION {
                return Err(FormatError::UnsupportedVersion {
                    file: meta.file.clone(),
                    version: version.to_string(),
                }
                .into());
            }
        }
        if let Some(name) = meta.optional(row, "name") {
            network.set_name(name);
        }
    }

    let snapshots_path = dir.join("snapshots.csv");
    if snapshots_path.exists() {
        let table = Table::read(&snapshots_path)?;
        let label = table.column("snapshot")?;
        let weighting = table.position("weighting");
        let mut labels = Vec::with_capacity(table.rows.len());
        let mut weights = Vec::with_capacity(table.rows.len());
        for row in 0..table.rows.len() {
            labels.push(table.parse(row, label, parse_snapshot)?);
            if let Some(column) = weighting {
                weights.push(table.parse(row, column, |cell| cell.parse::<f64>().ok())?);
            }
        }
        let mut index = SnapshotIndex::new(labels)?;
        if weighting.is_some() {
            index.set_weightings(weights)?;
        }
        debug!(snapshots = index.len(), "read snapshot index");
        network.set_snapshot_index(index);
    }

    let buses = Table::read(&dir.join("buses.csv"))?;
    let bus_fields = fields(&BusParams::default())?;
    let id_column = buses.column("id")?;
    for (row, record) in buses.rows.iter().enumerate() {
        let mut object = Map::new();
        for (column, name) in buses.header.iter().enumerate() {
            if column == id_column {
                continue;
            }
            let template = bus_fields
                .get(name)
                .ok_or_else(|| buses.unknown_column(name))?;
            if let Some(value) = buses.value(row, column, template)? {
                object.insert(name.clone(), value);
            }
        }
        let params: BusParams = serde_json::from_value(Value::Object(object))
            .with_context(|| format!("{}, row {row}", buses.file))?;
        network.add_node(&record[id_column], params)?;
    }

    for kind in ComponentKind::ALL {
        let layout = TableLayout::new(kind)?;
        let path = dir.join(layout.file_name());
        if !path.exists() {
            continue;
        }
        let table = Table::read(&path)?;
        for row in 0..table.rows.len() {
            let (id, nodes, params) = layout.parse(&table, row)?;
            let refs: Vec<&str> = nodes.iter().map(String::as_str).collect();
            network.add_component(kind, id, &refs, params)?;
        }
    }

    // Sorted, so `p_max_pu` series land before `p_min_pu` ones.
    let mut series_files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if let Some((kind, attribute)) = series_file(&path) {
            series_files.push((path, kind, attribute));
        }
    }
    series_files.sort_by(|a, b| a.0.cmp(&b.0));
    for (path, kind, attribute) in series_files {
        read_series(&mut network, &path, kind, &attribute)?;
    }

    info!(
        dir = %dir.display(),
        buses = network.nodes().len(),
        components = network.components().len(),
        "imported network"
    );
    Ok(network)
}

fn read_series(
    network: &mut Network,
    path: &Path,
    kind: ComponentKind,
    attribute: &str,
) -> Result<()> {
    let table = Table::read(path)?;
    let label = table.column("snapshot")?;
    let index = network.horizon()?.clone();
    if table.rows.len() != index.len() {
        return Err(NetworkError::HorizonMismatch {
            expected: index.len(),
            actual: table.rows.len(),
        }
        .into());
    }
    for row in 0..table.rows.len() {
        let snapshot = table.parse(row, label, parse_snapshot)?;
        if snapshot != index.labels()[row] {
            return Err(NetworkError::InvalidHorizon(format!(
                "{}: row {row} is {snapshot}, expected {}",
                table.file,
                index.labels()[row]
            ))
            .into());
        }
    }

    for (column, id) in table.header.iter().enumerate() {
        if column == label {
            continue;
        }
        let component = network
            .component(id)
            .ok_or_else(|| NetworkError::UnknownComponent(id.clone()))?;
        if component.kind() != kind {
            return Err(NetworkError::UnknownAttribute {
                kind: component.kind(),
                attribute: attribute.to_string(),
            }
            .into());
        }
        let mut values = Vec::with_capacity(table.rows.len());
        for row in 0..table.rows.len() {
            values.push(table.parse(row, column, |cell| cell.parse::<f64>().ok())?);
        }
        network.set_time_series(id, attribute, values)?;
    }
    Ok(())
}

/// Column layout of one component table.
struct TableLayout {
    kind: ComponentKind,
    /// Attribute name to default value, which also fixes the cell type
    params: Map<String, Value>,
    extension: Option<Map<String, Value>>,
}

impl TableLayout {
    fn new(kind: ComponentKind) -> Result<Self> {
        let mut params = fields(&ComponentParams::defaults(kind))?;
        params.remove("kind");
        let extension = match params.remove("extension") {
            Some(_) => Some(fields(&Extension::default())?),
            None => None,
        };
        Ok(Self {
            kind,
            params,
            extension,
        })
    }

    fn file_name(&self) -> String {
        format!("{}.csv", self.kind.table_name())
    }

    fn node_columns(&self) -> &'static [&'static str] {
        if self.kind.is_binary() {
            &["bus0", "bus1"]
        } else {
            &["bus"]
        }
    }

    fn header(&self) -> Vec<String> {
        let mut header = vec!["id".to_string()];
        header.extend(self.node_columns().iter().map(|c| c.to_string()));
        header.extend(self.params.keys().cloned());
        if let Some(extension) = &self.extension {
            header.extend(extension.keys().map(|k| format!("{EXTENSION_PREFIX}{k}")));
        }
        header
    }

    fn row(&self, component: &Component) -> Result<Vec<String>> {
        let values = fields(&component.params)?;
        let mut row = vec![component.id.to_string()];
        row.extend(component.attachment.nodes().iter().map(|n| n.to_string()));
        row.extend(self.params.keys().map(|key| to_cell(values.get(key))));
        if let Some(extension) = &self.extension {
            let set = values.get("extension").and_then(Value::as_object);
            row.extend(
                extension
                    .keys()
                    .map(|key| to_cell(set.and_then(|object| object.get(key)))),
            );
        }
        Ok(row)
    }

    fn parse(&self, table: &Table, row: usize) -> Result<(String, Vec<String>, ComponentParams)> {
        let record = &table.rows[row];
        let id_column = table.column("id")?;
        let mut nodes = Vec::new();
        let mut node_positions = Vec::new();
        for name in self.node_columns() {
            let column = table.column(name)?;
            nodes.push(record[column].to_string());
            node_positions.push(column);
        }

        let mut object = Map::new();
        object.insert("kind".into(), Value::String(self.kind.as_str().into()));
        let mut extension = Map::new();
        for (column, name) in table.header.iter().enumerate() {
            if column == id_column || node_positions.contains(&column) {
                continue;
            }
            let (template, target) = match name.strip_prefix(EXTENSION_PREFIX) {
                Some(field) => {
                    let template = self
                        .extension
                        .as_ref()
                        .and_then(|fields| fields.get(field))
                        .ok_or_else(|| self.unknown(name))?;
                    (template, (&mut extension, field))
                }
                None => {
                    let template = self.params.get(name).ok_or_else(|| self.unknown(name))?;
                    (template, (&mut object, name.as_str()))
                }
            };
            if let Some(value) = table.value(row, column, template)? {
                target.0.insert(target.1.to_string(), value);
            }
        }
        if !extension.is_empty() {
            object.insert("extension".into(), Value::Object(extension));
        }

        let params = serde_json::from_value(Value::Object(object))
            .with_context(|| format!("{}, row {row}", table.file))?;
        Ok((record[id_column].to_string(), nodes, params))
    }

    fn unknown(&self, column: &str) -> NetworkError {
        NetworkError::UnknownAttribute {
            kind: self.kind,
            attribute: column.to_string(),
        }
    }
}

/// A CSV file held in memory.
struct Table {
    file: String,
    header: Vec<String>,
    rows: Vec<csv::StringRecord>,
}

impl Table {
    fn read(path: &Path) -> Result<Self> {
        let mut reader =
            csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
        let header = reader
            .headers()
            .with_context(|| format!("reading header of {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Self {
            file: file_label(path),
            header,
            rows,
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    fn column(&self, name: &str) -> Result<usize, FormatError> {
        self.position(name).ok_or_else(|| FormatError::MissingColumn {
            file: self.file.clone(),
            column: name.to_string(),
        })
    }

    fn optional<'a>(&self, record: &'a csv::StringRecord, name: &str) -> Option<&'a str> {
        self.position(name)
            .and_then(|column| record.get(column))
            .filter(|cell| !cell.is_empty())
    }

    fn invalid(&self, row: usize, column: usize) -> FormatError {
        FormatError::InvalidCell {
            file: self.file.clone(),
            row,
            column: self.header.get(column).cloned().unwrap_or_default(),
            value: self.rows[row].get(column).unwrap_or_default().to_string(),
        }
    }

    fn unknown_column(&self, name: &str) -> FormatError {
        FormatError::UnexpectedColumn {
            file: self.file.clone(),
            column: name.to_string(),
        }
    }

    /// Parse a mandatory cell.
    fn parse<T>(
        &self,
        row: usize,
        column: usize,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, FormatError> {
        self.rows[row]
            .get(column)
            .and_then(|cell| parse(cell.trim()))
            .ok_or_else(|| self.invalid(row, column))
    }

    /// Cell typed after `template`. An empty cell is the empty string in a
    /// text column and `None` (the default applies) everywhere else.
    fn value(&self, row: usize, column: usize, template: &Value) -> Result<Option<Value>, FormatError> {
        let cell = self.rows[row].get(column).unwrap_or_default();
        if cell.is_empty() {
            let text = matches!(template, Value::String(_));
            return Ok(text.then_some(Value::String(String::new())));
        }
        from_cell(cell, template)
            .map(Some)
            .ok_or_else(|| self.invalid(row, column))
    }
}

fn fields<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value).context("serializing attributes")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("attributes serialized to {other}, expected an object"),
    }
}

fn to_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => match (number.as_i64(), number.as_f64()) {
            (Some(integer), _) => integer.to_string(),
            (None, Some(float)) => format_float(float),
            (None, None) => number.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

fn from_cell(cell: &str, template: &Value) -> Option<Value> {
    match template {
        Value::String(_) => Some(Value::String(cell.to_string())),
        Value::Bool(_) => cell.trim().parse::<bool>().ok().map(Value::Bool),
        Value::Number(number) if number.is_f64() => float_cell(cell.trim()),
        _ => {
            let cell = cell.trim();
            match cell.parse::<i64>() {
                // "-0" and "+3" are floats written by hand or by `format_float`
                Ok(integer) if integer.to_string() == cell => Some(Value::from(integer)),
                _ => float_cell(cell),
            }
        }
    }
}

fn float_cell(cell: &str) -> Option<Value> {
    cell.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Shortest text that parses back to the same `f64`.
pub(crate) fn format_float(value: f64) -> String {
    value.to_string()
}

pub(crate) fn format_snapshot(snapshot: &Snapshot) -> String {
    snapshot.format(SNAPSHOT_FORMAT).to_string()
}

fn parse_snapshot(text: &str) -> Option<Snapshot> {
    NaiveDateTime::parse_from_str(text, SNAPSHOT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `(kind, attribute)` of a `<table>-<attribute>.csv` file name.
fn series_file(path: &Path) -> Option<(ComponentKind, String)> {
    if path.extension()? != "csv" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (table, attribute) = stem.split_once('-')?;
    let kind = table.parse::<ComponentKind>().ok()?;
    (kind.table_name() == table && !attribute.is_empty()).then(|| (kind, attribute.to_string()))
}

fn remove_stale_series(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if series_file(&path).is_some() {
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
    }
    Ok(())
}

fn write_rows(
    path: &Path,
    header: &[String],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(header)
        .with_context(|| format!("writing header of {}", path.display()))?;
    for row in rows {
        writer
            .write_record(&row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}
