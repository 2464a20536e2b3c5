use netsim_core::{
    AnalysisKind, ComponentKind, ComponentParams, Diagnostics, EvaluationResult, Network,
    NetworkError, NetworkResult, ResultSeries, Snapshot, SnapshotIndex,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Warning,
}

/// How an evaluation terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Optimal,
    Converged,
    PartiallyConverged,
    Diverged,
    Infeasible,
    Unbounded,
    SolverFailed(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::Warning => write!(f, "warning"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Optimal => write!(f, "optimal"),
            Condition::Converged => write!(f, "converged"),
            Condition::PartiallyConverged => write!(f, "partially converged"),
            Condition::Diverged => write!(f, "diverged"),
            Condition::Infeasible => write!(f, "infeasible"),
            Condition::Unbounded => write!(f, "unbounded"),
            Condition::SolverFailed(reason) => write!(f, "solver failed: {reason}"),
        }
    }
}

/// Newton or linear solve statistics of one power-flow snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotOutcome {
    pub snapshot: Snapshot,
    pub converged: bool,
    pub iterations: usize,
    /// Largest remaining power mismatch (p.u.)
    pub max_mismatch: f64,
}

/// Everything one evaluation call produced.
///
/// Soft outcomes (divergence, infeasibility) are reported here rather than
/// raised; `result` is `None` when nothing usable was computed.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub mode: AnalysisKind,
    pub status: Status,
    pub condition: Condition,
    pub objective: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snapshot_outcomes: Vec<SnapshotOutcome>,
    #[serde(skip)]
    pub result: Option<EvaluationResult>,
    pub diagnostics: Diagnostics,
}

impl EvaluationReport {
    pub(crate) fn new(mode: AnalysisKind, diagnostics: Diagnostics) -> Self {
        Self {
            mode,
            status: Status::Ok,
            condition: Condition::Optimal,
            objective: None,
            snapshot_outcomes: Vec::new(),
            result: None,
            diagnostics,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn failed_snapshots(&self) -> Vec<Snapshot> {
        self.snapshot_outcomes
            .iter()
            .filter(|o| !o.converged)
            .map(|o| o.snapshot)
            .collect()
    }

    /// Turn a soft outcome into a hard error.
    pub fn check(&self) -> NetworkResult<()> {
        match &self.condition {
            Condition::Optimal | Condition::Converged => Ok(()),
            Condition::PartiallyConverged | Condition::Diverged => {
                let max_mismatch = self
                    .snapshot_outcomes
                    .iter()
                    .filter(|o| !o.converged)
                    .map(|o| o.max_mismatch)
                    .fold(0.0, f64::max);
                Err(NetworkError::PowerFlowDivergence {
                    snapshots: self.failed_snapshots(),
                    max_mismatch,
                })
            }
            other => Err(NetworkError::SolverFailure(other.to_string())),
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: status={}, condition={}", self.mode, self.status, self.condition)?;
        if let Some(objective) = self.objective {
            write!(f, ", objective={objective:.6}")?;
        }
        Ok(())
    }
}

/// Per-snapshot outputs gathered before they are moved into a result.
///
/// Unset slots stay `None`, so snapshots that were not solved are withheld.
#[derive(Debug)]
pub(crate) struct SeriesBuffer {
    len: usize,
    components: BTreeMap<(String, String), ResultSeries>,
    nodes: BTreeMap<(String, String), ResultSeries>,
}

impl SeriesBuffer {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            len,
            components: BTreeMap::new(),
            nodes: BTreeMap::new(),
        }
    }

    pub(crate) fn set(&mut self, id: &str, attribute: &str, t: usize, value: f64) {
        let len = self.len;
        self.components
            .entry((id.to_string(), attribute.to_string()))
            .or_insert_with(|| vec![None; len])[t] = Some(value);
    }

    pub(crate) fn set_node(&mut self, node: &str, attribute: &str, t: usize, value: f64) {
        let len = self.len;
        self.nodes
            .entry((node.to_string(), attribute.to_string()))
            .or_insert_with(|| vec![None; len])[t] = Some(value);
    }

    /// Declare a series so it exists even when every snapshot is withheld.
    pub(crate) fn declare(&mut self, id: &str, attribute: &str) {
        let len = self.len;
        self.components
            .entry((id.to_string(), attribute.to_string()))
            .or_insert_with(|| vec![None; len]);
    }

    pub(crate) fn declare_node(&mut self, node: &str, attribute: &str) {
        let len = self.len;
        self.nodes
            .entry((node.to_string(), attribute.to_string()))
            .or_insert_with(|| vec![None; len]);
    }

    pub(crate) fn flush_into(self, result: &mut EvaluationResult) {
        for ((id, attribute), values) in self.components {
            result.insert_series(&id, &attribute, values);
        }
        for ((node, attribute), values) in self.nodes {
            result.insert_node_series(&node, &attribute, values);
        }
    }
}

/// Column name of the optimised nominal capacity of a component.
pub(crate) fn nominal_column(params: &ComponentParams) -> Option<&'static str> {
    params.nominal().map(|(attribute, _)| match attribute {
        "s_nom" => "s_nom_opt",
        "e_nom" => "e_nom_opt",
        _ => "p_nom_opt",
    })
}

/// Copy nominal inputs to the `*_nom_opt` columns (fixed-capacity modes).
pub(crate) fn fill_nominal(result: &mut EvaluationResult, network: &Network) {
    for component in network.components() {
        let Some((_, nominal)) = component.params.nominal() else {
            continue;
        };
        let Some(column) = nominal_column(&component.params) else {
            continue;
        };
        let table = result.static_table_mut(component.kind());
        table.set(component.id.as_str(), column, nominal);
        if let ComponentParams::Storage(storage) = &component.params {
            table.set(component.id.as_str(), "p_nom_opt", storage.p_nom);
        }
    }
}

/// Weighted energy over solved snapshots of each component's active power.
///
/// Generators and storage use `p`, links use `p0`.
pub(crate) fn fill_energy(result: &mut EvaluationResult, network: &Network, index: &SnapshotIndex) {
    for component in network.components() {
        let attribute = match component.kind() {
            ComponentKind::Generator | ComponentKind::Storage | ComponentKind::Load => "p",
            ComponentKind::Link => "p0",
            ComponentKind::Line => continue,
        };
        let Some(series) = result.series(component.id.as_str(), attribute) else {
            continue;
        };
        let energy: f64 = series
            .iter()
            .zip(index.weightings())
            .filter_map(|(value, w)| value.map(|v| v * w))
            .sum();
        result
            .static_table_mut(component.kind())
            .set(component.id.as_str(), "energy", energy);
    }
}

/// Per-bus static rows: `v_nom` and the weighted mean of every plain node
/// series (`v_ang_mean`, `v_mag_pu_mean`, ...) over solved snapshots.
pub(crate) fn fill_nodes(result: &mut EvaluationResult, network: &Network, index: &SnapshotIndex) {
    let means: Vec<(String, String, f64)> = result
        .iter_node_series()
        .filter(|(_, attribute, _)| !attribute.contains('@'))
        .filter_map(|(node, attribute, series)| {
            let (sum, weight) = series
                .iter()
                .zip(index.weightings())
                .filter_map(|(value, w)| value.map(|v| (v * w, *w)))
                .fold((0.0, 0.0), |(s, tw), (v, w)| (s + v, tw + w));
            (weight > 0.0).then(|| (node.to_string(), format!("{attribute}_mean"), sum / weight))
        })
        .collect();
    let table = result.node_table_mut();
    for bus in network.nodes() {
        table.set(bus.id.as_str(), "v_nom", bus.params.v_nom);
    }
    for (node, column, mean) in means {
        table.set(&node, &column, mean);
    }
}
