//! Operational linear optimization: least-cost dispatch over the horizon.
//!
//! One linear program couples all snapshots through ramp limits and storage
//! state of energy. Network flows use the linearised model of
//! [`crate::power_flow`]: `f_l = base · (θ_i − θ_j) / x_l`, with one
//! reference angle per island.
//!
//! ```text
//! min  Σ_t w_t · ( Σ_g mc_g,t·p_g,t + Σ_k mc_k,t·p_k,t + Σ_s mc_s,t·d_s,t )
//! s.t. Σ gen + Σ (d − c) + Σ flows in − Σ flows out = load      (each bus, t)
//!      p_min_pu·P ≤ p ≤ p_max_pu·P,  |f| ≤ s_max_pu·S
//!      e_t = (1 − loss)^{w_t} e_{t−1} + w_t η_s c_t − w_t d_t / η_d
//! ```
//!
//! Set-points (`p_set`) of dispatchable components are ignored here.

use crate::lp::{LinearProgram, LpOutcome, LpSettings, LpSolverKind, RowSense, VarId};
use crate::report::{
    fill_energy, fill_nodes, fill_nominal, Condition, EvaluationReport, SeriesBuffer, Status,
};
use netsim_core::{
    sub_networks, AnalysisKind, Component, ComponentParams, Diagnostics, EvaluationResult,
    Network, NetworkError, NetworkResult, SnapshotIndex,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Settings shared by the operational and investment modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationOptions {
    pub lp_solver: LpSolverKind,
    /// Relative MIP gap, only used by backends with integer support
    pub mip_gap: f64,
    /// System base for line reactances (MVA)
    pub base_mva: f64,
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self {
            lp_solver: LpSolverKind::default(),
            mip_gap: LpSettings::default().mip_gap,
            base_mva: 100.0,
        }
    }
}

impl OptimizationOptions {
    pub fn with_solver(mut self, solver: LpSolverKind) -> Self {
        self.lp_solver = solver;
        self
    }

    pub(crate) fn validate(&self) -> NetworkResult<()> {
        if !(self.mip_gap.is_finite() && self.mip_gap >= 0.0) {
            return Err(NetworkError::invalid(
                "optimization",
                "mip_gap",
                format!("must be non-negative, got {}", self.mip_gap),
            ));
        }
        if !(self.base_mva.is_finite() && self.base_mva > 0.0) {
            return Err(NetworkError::invalid(
                "optimization",
                "base_mva",
                format!("must be positive, got {}", self.base_mva),
            ));
        }
        Ok(())
    }

    pub(crate) fn settings(&self) -> LpSettings {
        LpSettings {
            mip_gap: self.mip_gap,
        }
    }
}

/// Nominal rating of a component inside one program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Capacity {
    Fixed(f64),
    /// Decided by the program. For storage this is the energy rating.
    Variable(VarId),
}

impl Capacity {
    pub(crate) fn of(component: &Component) -> Self {
        Capacity::Fixed(component.params.nominal().map_or(0.0, |(_, value)| value))
    }
}

/// Variables of one component over the snapshots of a block.
enum Handles {
    Generator {
        p: Vec<VarId>,
    },
    Line {
        flow: Vec<VarId>,
    },
    Link {
        p: Vec<VarId>,
    },
    Storage {
        charge: Vec<VarId>,
        discharge: Vec<VarId>,
        energy: Vec<VarId>,
    },
    Load,
}

/// Dispatch variables and constraints for one pass over the horizon.
///
/// The investment mode stacks one block per period, each with its own
/// objective scale and name prefix.
pub(crate) struct OperationalBlock {
    handles: Vec<Handles>,
    /// `theta[t][bus]`
    theta: Vec<Vec<VarId>>,
}

impl OperationalBlock {
    /// Add the block to `lp`. `capacities` is indexed like
    /// `Network::components()`.
    pub(crate) fn build(
        lp: &mut LinearProgram,
        network: &Network,
        index: &SnapshotIndex,
        capacities: &[Capacity],
        scale: f64,
        prefix: &str,
        base_mva: f64,
    ) -> NetworkResult<Self> {
        let steps = index.len();
        let nodes = network.nodes();
        let bus_position = |id: &str| {
            network
                .node_position(id)
                .ok_or_else(|| NetworkError::UnknownNode(id.to_string()))
        };

        // Angles; each island's first bus is the reference.
        let mut reference = vec![false; nodes.len()];
        for island in sub_networks(network) {
            if let Some(first) = island.buses.first() {
                reference[bus_position(first.as_str())?] = true;
            }
        }
        let theta: Vec<Vec<VarId>> = (0..steps)
            .map(|t| {
                nodes
                    .iter()
                    .enumerate()
                    .map(|(i, bus)| {
                        let name = format!("{prefix}theta[{}][{t}]", bus.id);
                        if reference[i] {
                            lp.add_variable(name, 0.0, 0.0)
                        } else {
                            lp.add_variable(name, f64::NEG_INFINITY, f64::INFINITY)
                        }
                    })
                    .collect()
            })
            .collect();

        // balance[t][bus]: terms of Σ injections
        let mut balance: Vec<Vec<Vec<(VarId, f64)>>> = vec![vec![Vec::new(); nodes.len()]; steps];
        let mut demand = vec![vec![0.0; nodes.len()]; steps];
        let mut handles = Vec::with_capacity(network.components().len());

        for (position, component) in network.components().iter().enumerate() {
            let id = component.id.as_str();
            let bus = bus_position(component.bus().as_str())?;
            let capacity = capacities
                .get(position)
                .copied()
                .unwrap_or_else(|| Capacity::of(component));
            let at = |attribute: &str, t: usize| network.attribute_at(component, attribute, t);
            let cost = |attribute: &str, t: usize| {
                scale * index.weight(t) * at(attribute, t).unwrap_or(0.0)
            };

            let entry = match &component.params {
                ComponentParams::Generator(params) => {
                    let mut p = Vec::with_capacity(steps);
                    for t in 0..steps {
                        let var = bounded(
                            lp,
                            &format!("{prefix}p[{id}][{t}]"),
                            at("p_min_pu", t).unwrap_or(0.0),
                            at("p_max_pu", t).unwrap_or(1.0),
                            capacity,
                        );
                        lp.add_objective(var, cost("marginal_cost", t));
                        balance[t][bus].push((var, 1.0));
                        p.push(var);
                    }
                    for t in 1..steps {
                        if let Some(up) = params.ramp_limit_up {
                            ramp_row(lp, &format!("{prefix}ramp_up[{id}][{t}]"), p[t], p[t - 1], up, capacity);
                        }
                        if let Some(down) = params.ramp_limit_down {
                            ramp_row(lp, &format!("{prefix}ramp_down[{id}][{t}]"), p[t - 1], p[t], down, capacity);
                        }
                    }
                    Handles::Generator { p }
                }
                ComponentParams::Load(_) => {
                    for (t, row) in demand.iter_mut().enumerate() {
                        row[bus] += at("p_set", t).unwrap_or(0.0);
                    }
                    Handles::Load
                }
                ComponentParams::Line(params) => {
                    let to = secondary(network, component)?;
                    let mut flow = Vec::with_capacity(steps);
                    for t in 0..steps {
                        let limit = at("s_max_pu", t).unwrap_or(1.0);
                        let var = bounded(lp, &format!("{prefix}f[{id}][{t}]"), -limit, limit, capacity);
                        lp.add_row(
                            format!("{prefix}kvl[{id}][{t}]"),
                            vec![
                                (var, 1.0),
                                (theta[t][bus], -base_mva / params.x),
                                (theta[t][to], base_mva / params.x),
                            ],
                            RowSense::Eq,
                            0.0,
                        );
                        balance[t][bus].push((var, -1.0));
                        balance[t][to].push((var, 1.0));
                        flow.push(var);
                    }
                    Handles::Line { flow }
                }
                ComponentParams::Link(_) => {
                    let to = secondary(network, component)?;
                    let mut p = Vec::with_capacity(steps);
                    for t in 0..steps {
                        let var = bounded(
                            lp,
                            &format!("{prefix}p[{id}][{t}]"),
                            at("p_min_pu", t).unwrap_or(0.0),
                            at("p_max_pu", t).unwrap_or(1.0),
                            capacity,
                        );
                        lp.add_objective(var, cost("marginal_cost", t));
                        balance[t][bus].push((var, -1.0));
                        balance[t][to].push((var, at("efficiency", t).unwrap_or(1.0)));
                        p.push(var);
                    }
                    Handles::Link { p }
                }
                ComponentParams::Storage(params) => {
                    let power = match capacity {
                        Capacity::Variable(energy) => match params.max_hours() {
                            Some(hours) => PowerRating::Scaled(energy, 1.0 / hours),
                            None => PowerRating::Fixed(params.p_nom),
                        },
                        Capacity::Fixed(_) => PowerRating::Fixed(params.p_nom),
                    };
                    let energy_capacity = match capacity {
                        Capacity::Variable(var) => Capacity::Variable(var),
                        Capacity::Fixed(_) => Capacity::Fixed(params.e_nom),
                    };
                    let retention = 1.0 - params.standing_loss;
                    let mut charge = Vec::with_capacity(steps);
                    let mut discharge = Vec::with_capacity(steps);
                    let mut energy = Vec::with_capacity(steps);
                    for t in 0..steps {
                        let c = power.variable(lp, &format!("{prefix}charge[{id}][{t}]"));
                        let d = power.variable(lp, &format!("{prefix}discharge[{id}][{t}]"));
                        let e = bounded(
                            lp,
                            &format!("{prefix}e[{id}][{t}]"),
                            params.e_min_pu,
                            params.e_max_pu,
                            energy_capacity,
                        );
                        lp.add_objective(d, cost("marginal_cost", t));
                        balance[t][bus].push((d, 1.0));
                        balance[t][bus].push((c, -1.0));
                        charge.push(c);
                        discharge.push(d);
                        energy.push(e);
                    }
                    for t in 0..steps {
                        let w = index.weight(t);
                        let mut terms = vec![
                            (energy[t], 1.0),
                            (charge[t], -w * params.efficiency_store),
                            (discharge[t], w / params.efficiency_dispatch),
                        ];
                        let decay = retention.powf(w);
                        let mut rhs = 0.0;
                        if t > 0 {
                            terms.push((energy[t - 1], -decay));
                        } else if params.e_cyclic {
                            terms.push((energy[steps - 1], -decay));
                        } else {
                            match energy_capacity {
                                Capacity::Fixed(e_nom) => rhs = decay * params.e_initial_pu * e_nom,
                                Capacity::Variable(var) => {
                                    terms.push((var, -decay * params.e_initial_pu))
                                }
                            }
                        }
                        lp.add_row(format!("{prefix}soc[{id}][{t}]"), terms, RowSense::Eq, rhs);
                    }
                    Handles::Storage {
                        charge,
                        discharge,
                        energy,
                    }
                }
            };
            handles.push(entry);
        }

        for (t, rows) in balance.into_iter().enumerate() {
            for (i, terms) in rows.into_iter().enumerate() {
                lp.add_row(
                    format!("{prefix}balance[{}][{t}]", nodes[i].id),
                    terms,
                    RowSense::Eq,
                    demand[t][i],
                );
            }
        }

        Ok(Self { handles, theta })
    }

    /// Copy one solved block into `buffer`. With `suffix`, attribute names
    /// become `<attribute>@<suffix>`.
    pub(crate) fn record(
        &self,
        values: &[f64],
        network: &Network,
        buffer: &mut SeriesBuffer,
        suffix: Option<&str>,
    ) {
        let name = |attribute: &str| match suffix {
            Some(suffix) => format!("{attribute}@{suffix}"),
            None => attribute.to_string(),
        };
        let value = |var: VarId| values[var.index()];

        for (t, row) in self.theta.iter().enumerate() {
            for (bus, &var) in network.nodes().iter().zip(row) {
                buffer.set_node(bus.id.as_str(), &name("v_ang"), t, value(var));
            }
        }

        for (component, handles) in network.components().iter().zip(&self.handles) {
            let id = component.id.as_str();
            match handles {
                Handles::Generator { p } => {
                    for (t, &var) in p.iter().enumerate() {
                        buffer.set(id, &name("p"), t, value(var));
                    }
                }
                Handles::Line { flow } => {
                    for (t, &var) in flow.iter().enumerate() {
                        buffer.set(id, &name("p0"), t, value(var));
                        buffer.set(id, &name("p1"), t, -value(var));
                    }
                }
                Handles::Link { p } => {
                    for (t, &var) in p.iter().enumerate() {
                        let efficiency = network.attribute_at(component, "efficiency", t).unwrap_or(1.0);
                        buffer.set(id, &name("p0"), t, value(var));
                        buffer.set(id, &name("p1"), t, -efficiency * value(var));
                    }
                }
                Handles::Storage {
                    charge,
                    discharge,
                    energy,
                } => {
                    for t in 0..energy.len() {
                        let (c, d) = (value(charge[t]), value(discharge[t]));
                        buffer.set(id, &name("p"), t, d - c);
                        buffer.set(id, &name("p_store"), t, c);
                        buffer.set(id, &name("p_dispatch"), t, d);
                        buffer.set(id, &name("state_of_energy"), t, value(energy[t]));
                    }
                }
                Handles::Load => {
                    for t in 0..self.theta.len() {
                        let p = network.attribute_at(component, "p_set", t).unwrap_or(0.0);
                        buffer.set(id, &name("p"), t, p);
                    }
                }
            }
        }
    }
}

/// Storage power limit: fixed, or proportional to the energy variable.
enum PowerRating {
    Fixed(f64),
    Scaled(VarId, f64),
}

impl PowerRating {
    fn variable(&self, lp: &mut LinearProgram, name: &str) -> VarId {
        match *self {
            PowerRating::Fixed(limit) => lp.add_variable(name, 0.0, limit),
            PowerRating::Scaled(energy, ratio) => {
                let var = lp.add_variable(name, 0.0, f64::INFINITY);
                lp.add_row(
                    format!("{name}:max"),
                    vec![(var, 1.0), (energy, -ratio)],
                    RowSense::Le,
                    0.0,
                );
                var
            }
        }
    }
}

/// Variable limited to `[lo·cap, hi·cap]`.
fn bounded(lp: &mut LinearProgram, name: &str, lo: f64, hi: f64, capacity: Capacity) -> VarId {
    match capacity {
        Capacity::Fixed(cap) => lp.add_variable(name, lo * cap, hi * cap),
        Capacity::Variable(cap) => {
            let lower = if lo >= 0.0 { 0.0 } else { f64::NEG_INFINITY };
            let var = lp.add_variable(name, lower, f64::INFINITY);
            lp.add_row(format!("{name}:max"), vec![(var, 1.0), (cap, -hi)], RowSense::Le, 0.0);
            if lo != 0.0 {
                lp.add_row(format!("{name}:min"), vec![(var, 1.0), (cap, -lo)], RowSense::Ge, 0.0);
            }
            var
        }
    }
}

/// `later − earlier ≤ limit·cap`
fn ramp_row(
    lp: &mut LinearProgram,
    name: &str,
    later: VarId,
    earlier: VarId,
    limit: f64,
    capacity: Capacity,
) {
    match capacity {
        Capacity::Fixed(cap) => {
            lp.add_row(name, vec![(later, 1.0), (earlier, -1.0)], RowSense::Le, limit * cap);
        }
        Capacity::Variable(cap) => {
            lp.add_row(
                name,
                vec![(later, 1.0), (earlier, -1.0), (cap, -limit)],
                RowSense::Le,
                0.0,
            );
        }
    }
}

fn secondary(network: &Network, component: &Component) -> NetworkResult<usize> {
    let node = component.attachment.secondary().ok_or_else(|| {
        NetworkError::invalid(component.id.as_str(), "bus1", "two-ended component without bus1")
    })?;
    network
        .node_position(node.as_str())
        .ok_or_else(|| NetworkError::UnknownNode(node.to_string()))
}

/// Map a non-optimal LP outcome onto the report.
pub(crate) fn apply_failure(report: &mut EvaluationReport, outcome: &LpOutcome) {
    report.condition = match outcome {
        LpOutcome::Optimal { .. } => return,
        LpOutcome::Infeasible => Condition::Infeasible,
        LpOutcome::Unbounded => Condition::Unbounded,
        LpOutcome::Failed(reason) => Condition::SolverFailed(reason.clone()),
    };
    report.status = Status::Warning;
    warn!(mode = %report.mode, condition = %report.condition, "optimization produced no result");
    report
        .diagnostics
        .add_warning("solver", &format!("no result: {}", report.condition));
}

/// Least-cost dispatch with all capacities fixed at their nominal values.
pub fn optimize_operations(
    network: &Network,
    options: &OptimizationOptions,
) -> NetworkResult<EvaluationReport> {
    options.validate()?;
    let index = network.horizon()?;
    let mut diagnostics = Diagnostics::new();
    network.validate_into(&mut diagnostics);

    let mut lp = LinearProgram::new();
    let capacities: Vec<Capacity> = network.components().iter().map(Capacity::of).collect();
    let block = OperationalBlock::build(
        &mut lp,
        network,
        index,
        &capacities,
        1.0,
        "",
        options.base_mva,
    )?;
    info!(
        solver = options.lp_solver.as_str(),
        variables = lp.num_variables(),
        rows = lp.num_rows(),
        snapshots = index.len(),
        "running operational optimization"
    );

    let outcome = options
        .lp_solver
        .solve(&lp, &options.settings(), &mut diagnostics);
    let mut report = EvaluationReport::new(AnalysisKind::Operational, diagnostics);
    let LpOutcome::Optimal { values, objective } = &outcome else {
        apply_failure(&mut report, &outcome);
        return Ok(report);
    };

    let mut buffer = SeriesBuffer::new(index.len());
    block.record(values, network, &mut buffer, None);
    let mut result = EvaluationResult::new(
        AnalysisKind::Operational,
        network.revision(),
        index.labels().to_vec(),
    );
    buffer.flush_into(&mut result);
    fill_nominal(&mut result, network);
    fill_energy(&mut result, network, index);
    fill_nodes(&mut result, network, index);
    result.objective = Some(*objective);

    report.condition = Condition::Optimal;
    report.objective = Some(*objective);
    report.result = Some(result);
    info!(objective, "operational optimization finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use netsim_core::{BusParams, GeneratorParams, LineParams, LoadParams, SnapshotIndex};

    fn hours(network: &mut Network, count: usize) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        network.set_snapshot_index(SnapshotIndex::hourly(start, count).unwrap());
    }

    fn merit_order() -> Network {
        let mut network = Network::new();
        network.add_node("a", BusParams::default()).unwrap();
        network.add_node("b", BusParams::default()).unwrap();
        network
            .add_generator(
                "cheap",
                "a",
                GeneratorParams::with_capacity(60.0).with_marginal_cost(10.0),
            )
            .unwrap();
        network
            .add_generator(
                "dear",
                "b",
                GeneratorParams::with_capacity(100.0).with_marginal_cost(50.0),
            )
            .unwrap();
        network
            .add_load("demand", "b", LoadParams::new(80.0, 0.0))
            .unwrap();
        network
            .add_line("a-b", "a", "b", LineParams::new(0.1, 0.0, 100.0))
            .unwrap();
        hours(&mut network, 2);
        network
    }

    #[test]
    fn dispatches_in_merit_order() {
        let network = merit_order();
        let report = optimize_operations(&network, &OptimizationOptions::default()).unwrap();
        assert_eq!(report.condition, Condition::Optimal);
        let result = report.result.unwrap();
        for t in 0..2 {
            assert!((result.series("cheap", "p").unwrap()[t].unwrap() - 60.0).abs() < 1e-4);
            assert!((result.series("dear", "p").unwrap()[t].unwrap() - 20.0).abs() < 1e-4);
            assert!((result.series("a-b", "p0").unwrap()[t].unwrap() - 60.0).abs() < 1e-4);
        }
        // 2 h · (60·10 + 20·50)
        assert!((report.objective.unwrap() - 3200.0).abs() < 1e-2);
    }

    #[test]
    fn line_limit_forces_expensive_dispatch() {
        let mut network = merit_order();
        network.remove_component("a-b").unwrap();
        network
            .add_line("a-b", "a", "b", LineParams::new(0.1, 0.0, 30.0))
            .unwrap();
        hours(&mut network, 1);
        let report = optimize_operations(&network, &OptimizationOptions::default()).unwrap();
        let result = report.result.unwrap();
        assert!((result.series("cheap", "p").unwrap()[0].unwrap() - 30.0).abs() < 1e-4);
        assert!((result.series("dear", "p").unwrap()[0].unwrap() - 50.0).abs() < 1e-4);
    }

    #[test]
    fn ramp_limit_binds_between_snapshots() {
        let mut network = merit_order();
        network.remove_component("cheap").unwrap();
        let mut params = GeneratorParams::with_capacity(60.0).with_marginal_cost(10.0);
        params.ramp_limit_up = Some(0.25);
        network.add_generator("cheap", "a", params).unwrap();
        hours(&mut network, 2);
        network
            .set_time_series("demand", "p_set", vec![10.0, 80.0])
            .unwrap();
        let report = optimize_operations(&network, &OptimizationOptions::default()).unwrap();
        let p = report.result.unwrap().series("cheap", "p").unwrap().clone();
        let (p0, p1) = (p[0].unwrap(), p[1].unwrap());
        assert!(p1 - p0 <= 15.0 + 1e-4, "ramp {p0} -> {p1}");
    }

    #[test]
    fn infeasible_program_is_reported_without_result() {
        let mut network = merit_order();
        hours(&mut network, 1);
        network
            .set_time_series("demand", "p_set", vec![1000.0])
            .unwrap();
        let report = optimize_operations(&network, &OptimizationOptions::default()).unwrap();
        assert_eq!(report.status, Status::Warning);
        assert!(matches!(
            report.condition,
            Condition::Infeasible | Condition::SolverFailed(_)
        ));
        assert!(report.result.is_none());
        assert!(report.objective.is_none());
    }

    #[test]
    fn rejects_negative_gap() {
        let options = OptimizationOptions {
            mip_gap: -1.0,
            ..OptimizationOptions::default()
        };
        assert!(optimize_operations(&merit_order(), &options).is_err());
    }
}
