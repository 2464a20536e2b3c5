//! Evaluation results: static tables and per-snapshot series.
//!
//! A result is tied to the structural revision of the network it was computed
//! from. The reader methods on [`crate::Network`] refuse to serve a result
//! whose revision no longer matches.

use crate::components::ComponentKind;
use crate::snapshots::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which analysis produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    PowerFlow,
    Operational,
    Investment,
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisKind::PowerFlow => write!(f, "power flow"),
            AnalysisKind::Operational => write!(f, "operational optimization"),
            AnalysisKind::Investment => write!(f, "investment optimization"),
        }
    }
}

/// One value per snapshot; `None` where the snapshot's evaluation failed.
pub type ResultSeries = Vec<Option<f64>>;

/// Row-per-entity table with a stable, ordered set of columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StaticTable {
    columns: Vec<String>,
    rows: BTreeMap<String, BTreeMap<String, f64>>,
}

impl StaticTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a column so it appears even when no row sets it.
    pub fn add_column(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
    }

    pub fn set(&mut self, row: &str, column: &str, value: f64) {
        self.add_column(column);
        self.rows
            .entry(row.to_string())
            .or_default()
            .insert(column.to_string(), value);
    }

    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        self.rows.get(row).and_then(|r| r.get(column)).copied()
    }

    pub fn row(&self, row: &str) -> Option<&BTreeMap<String, f64>> {
        self.rows.get(row)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// Values of one column keyed by row id.
    pub fn column(&self, column: &str) -> BTreeMap<&str, f64> {
        self.rows
            .iter()
            .filter_map(|(id, row)| row.get(column).map(|v| (id.as_str(), *v)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

type SeriesMap = BTreeMap<String, BTreeMap<String, ResultSeries>>;

/// Output of one successful (possibly partial) evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub analysis: AnalysisKind,
    /// Structural revision of the network this result was computed against
    pub revision: u64,
    pub snapshots: Vec<Snapshot>,
    pub objective: Option<f64>,
    statics: BTreeMap<ComponentKind, StaticTable>,
    node_static: StaticTable,
    series: SeriesMap,
    node_series: SeriesMap,
}

impl EvaluationResult {
    /// Empty result with one (empty) static table per component kind.
    pub fn new(analysis: AnalysisKind, revision: u64, snapshots: Vec<Snapshot>) -> Self {
        Self {
            analysis,
            revision,
            snapshots,
            objective: None,
            statics: ComponentKind::ALL
                .into_iter()
                .map(|kind| (kind, StaticTable::new()))
                .collect(),
            node_static: StaticTable::new(),
            series: SeriesMap::new(),
            node_series: SeriesMap::new(),
        }
    }

    pub fn static_table(&self, kind: ComponentKind) -> &StaticTable {
        // Every kind is inserted by `new`; deserialized results may omit empty ones.
        static EMPTY: StaticTable = StaticTable {
            columns: Vec::new(),
            rows: BTreeMap::new(),
        };
        self.statics.get(&kind).unwrap_or(&EMPTY)
    }

    pub fn static_table_mut(&mut self, kind: ComponentKind) -> &mut StaticTable {
        self.statics.entry(kind).or_default()
    }

    pub fn node_table(&self) -> &StaticTable {
        &self.node_static
    }

    pub fn node_table_mut(&mut self) -> &mut StaticTable {
        &mut self.node_static
    }

    pub fn insert_series(&mut self, id: &str, attribute: &str, values: ResultSeries) {
        self.series
            .entry(id.to_string())
            .or_default()
            .insert(attribute.to_string(), values);
    }

    pub fn insert_node_series(&mut self, node: &str, attribute: &str, values: ResultSeries) {
        self.node_series
            .entry(node.to_string())
            .or_default()
            .insert(attribute.to_string(), values);
    }

    pub fn series(&self, id: &str, attribute: &str) -> Option<&ResultSeries> {
        self.series.get(id).and_then(|attrs| attrs.get(attribute))
    }

    pub fn node_series(&self, node: &str, attribute: &str) -> Option<&ResultSeries> {
        self.node_series.get(node).and_then(|attrs| attrs.get(attribute))
    }

    /// Attribute names with a series for one component.
    pub fn series_attributes(&self, id: &str) -> Vec<&str> {
        self.series
            .get(id)
            .map(|attrs| attrs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// All component series as `(id, attribute, values)`.
    pub fn iter_series(&self) -> impl Iterator<Item = (&str, &str, &ResultSeries)> {
        flatten(&self.series)
    }

    /// All node series as `(node, attribute, values)`.
    pub fn iter_node_series(&self) -> impl Iterator<Item = (&str, &str, &ResultSeries)> {
        flatten(&self.node_series)
    }

    /// Number of snapshots that carry values (not withheld).
    pub fn solved_snapshots(&self) -> usize {
        let Some((_, _, first)) = self.iter_node_series().next() else {
            return self.snapshots.len();
        };
        first.iter().filter(|v| v.is_some()).count()
    }
}

fn flatten(map: &SeriesMap) -> impl Iterator<Item = (&str, &str, &ResultSeries)> {
    map.iter().flat_map(|(id, attrs)| {
        attrs
            .iter()
            .map(move |(attr, values)| (id.as_str(), attr.as_str(), values))
    })
}
