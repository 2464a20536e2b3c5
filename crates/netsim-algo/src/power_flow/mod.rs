//! Power-flow mode: steady-state voltages and flows for fixed set-points.
//!
//! Each snapshot is solved on its own. Every electrical island gets one slack
//! bus: the bus of its `Slack`-controlled generator, else of its first
//! generator, else its first bus. All other generators need a `p_set`.
//!
//! | Method | Model | Outputs |
//! |--------|-------|---------|
//! | [`PowerFlowMethod::Ac`] | full π-model, Newton-Raphson | `v_mag_pu`, `v_ang`, `p`, `q` |
//! | [`PowerFlowMethod::Linear`] | `B'θ = P`, lossless | `v_ang`, `p` |
//!
//! A snapshot that does not converge is reported in the outcome list and its
//! outputs are withheld (`None`); the remaining snapshots are still solved.

mod ac;
mod linear;

use crate::report::{
    fill_energy, fill_nodes, fill_nominal, Condition, EvaluationReport, SeriesBuffer,
};
use crate::report::{SnapshotOutcome, Status};
use anyhow::anyhow;
use netsim_core::{
    sub_networks, AnalysisKind, ComponentKind, ComponentParams, Control, Diagnostics,
    EvaluationResult, Network, NetworkError, NetworkResult, SolverKind,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerFlowMethod {
    #[default]
    Ac,
    Linear,
}

impl PowerFlowMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerFlowMethod::Ac => "ac",
            PowerFlowMethod::Linear => "linear",
        }
    }
}

impl FromStr for PowerFlowMethod {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "ac" | "newton" => Ok(PowerFlowMethod::Ac),
            "linear" | "dc" => Ok(PowerFlowMethod::Linear),
            other => Err(anyhow!(
                "unknown power flow method '{other}'; supported values: ac, linear"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerFlowOptions {
    pub method: PowerFlowMethod,
    /// Convergence threshold on max(|ΔP|, |ΔQ|), p.u.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// System base for per-unit conversion (MVA)
    pub base_mva: f64,
    pub linear_solver: SolverKind,
}

impl Default for PowerFlowOptions {
    fn default() -> Self {
        Self {
            method: PowerFlowMethod::Ac,
            tolerance: 1e-6,
            max_iterations: 100,
            base_mva: 100.0,
            linear_solver: SolverKind::Faer,
        }
    }
}

impl PowerFlowOptions {
    pub fn linear() -> Self {
        Self {
            method: PowerFlowMethod::Linear,
            ..Self::default()
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_linear_solver(mut self, solver: SolverKind) -> Self {
        self.linear_solver = solver;
        self
    }

    fn validate(&self) -> NetworkResult<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(NetworkError::invalid(
                "power_flow",
                "tolerance",
                format!("must be positive, got {}", self.tolerance),
            ));
        }
        if self.max_iterations == 0 {
            return Err(NetworkError::invalid(
                "power_flow",
                "max_iterations",
                "at least one iteration is required",
            ));
        }
        if !(self.base_mva.is_finite() && self.base_mva > 0.0) {
            return Err(NetworkError::invalid(
                "power_flow",
                "base_mva",
                format!("must be positive, got {}", self.base_mva),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BusType {
    Slack,
    PV,
    PQ,
}

/// Role of a generator in power flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GenRole {
    /// Absorbs the island's active-power balance
    Slack,
    /// Reactive output follows from the bus voltage set-point
    Voltage,
    /// Injects its set-points
    Fixed,
}

pub(crate) struct LineData {
    /// Position in `Network::components()`
    pub component: usize,
    pub from: usize,
    pub to: usize,
    pub r: f64,
    pub x: f64,
    pub b: f64,
}

/// Bus classification and branch data, shared by every snapshot.
pub(crate) struct Topology {
    pub bus_types: Vec<BusType>,
    pub v_set: Vec<f64>,
    pub lines: Vec<LineData>,
    /// Indexed like `Network::components()`; `None` for non-generators
    roles: Vec<Option<GenRole>>,
    /// Number of `Slack`/`Voltage` generators per bus
    controllers: Vec<usize>,
}

impl Topology {
    fn build(network: &Network) -> NetworkResult<Self> {
        let n = network.nodes().len();
        let components = network.components();
        let bus_of = |position: usize| -> NetworkResult<usize> {
            let bus = components[position].bus();
            network
                .node_position(bus.as_str())
                .ok_or_else(|| NetworkError::UnknownNode(bus.to_string()))
        };

        let mut bus_types = vec![BusType::PQ; n];
        let v_set = network
            .nodes()
            .iter()
            .map(|bus| bus.params.v_mag_pu_set)
            .collect();
        let mut roles: Vec<Option<GenRole>> = components
            .iter()
            .map(|c| (c.kind() == ComponentKind::Generator).then_some(GenRole::Fixed))
            .collect();

        for island in sub_networks(network) {
            let members: Vec<usize> = island
                .buses
                .iter()
                .filter_map(|id| network.node_position(id.as_str()))
                .collect();
            let mut generators = Vec::new();
            for (position, component) in components.iter().enumerate() {
                if component.kind() == ComponentKind::Generator
                    && members.contains(&bus_of(position)?)
                {
                    generators.push(position);
                }
            }
            let slack = generators
                .iter()
                .copied()
                .find(|&g| {
                    components[g]
                        .as_generator()
                        .is_some_and(|p| p.control == Control::Slack)
                })
                .or_else(|| generators.first().copied());
            let slack_bus = match slack {
                Some(g) => {
                    roles[g] = Some(GenRole::Slack);
                    bus_of(g)?
                }
                None => match members.first() {
                    Some(&bus) => bus,
                    None => continue,
                },
            };
            bus_types[slack_bus] = BusType::Slack;
        }

        for (position, component) in components.iter().enumerate() {
            let Some(params) = component.as_generator() else {
                continue;
            };
            if roles[position] == Some(GenRole::Slack) {
                continue;
            }
            if params.p_set.is_none() && network.time_series(component.id.as_str(), "p_set").is_none()
            {
                return Err(NetworkError::invalid(
                    component.id.as_str(),
                    "p_set",
                    "power flow needs a set-point for every non-slack generator",
                ));
            }
            if params.control != Control::PQ {
                let bus = bus_of(position)?;
                if bus_types[bus] == BusType::PQ {
                    bus_types[bus] = BusType::PV;
                }
                roles[position] = Some(GenRole::Voltage);
            }
        }

        let mut controllers = vec![0; n];
        for (position, role) in roles.iter().enumerate() {
            if matches!(role, Some(GenRole::Slack | GenRole::Voltage)) {
                controllers[bus_of(position)?] += 1;
            }
        }

        let mut lines = Vec::new();
        for (position, component) in components.iter().enumerate() {
            let (Some(params), Some(to)) = (component.as_line(), component.attachment.secondary())
            else {
                continue;
            };
            let to = network
                .node_position(to.as_str())
                .ok_or_else(|| NetworkError::UnknownNode(to.to_string()))?;
            lines.push(LineData {
                component: position,
                from: bus_of(position)?,
                to,
                r: params.r,
                x: params.x,
                b: params.b,
            });
        }

        Ok(Self {
            bus_types,
            v_set,
            lines,
            roles,
            controllers,
        })
    }

    /// Specified injections (MW, Mvar) at snapshot `t`, excluding what the
    /// slack and voltage-controlling generators will cover.
    fn injections(&self, network: &Network, t: usize) -> (Vec<f64>, Vec<f64>) {
        let n = self.bus_types.len();
        let mut p = vec![0.0; n];
        let mut q = vec![0.0; n];
        for (position, component) in network.components().iter().enumerate() {
            let Some(bus) = network.node_position(component.bus().as_str()) else {
                continue;
            };
            let at = |attribute: &str| network.attribute_at(component, attribute, t);
            match &component.params {
                ComponentParams::Generator(_) => {
                    let role = self.roles[position];
                    if role != Some(GenRole::Slack) {
                        p[bus] += at("p_set").unwrap_or(0.0);
                    }
                    if role == Some(GenRole::Fixed) {
                        q[bus] += at("q_set").unwrap_or(0.0);
                    }
                }
                ComponentParams::Load(_) => {
                    p[bus] -= at("p_set").unwrap_or(0.0);
                    q[bus] -= at("q_set").unwrap_or(0.0);
                }
                ComponentParams::Storage(_) => {
                    p[bus] += at("p_set").unwrap_or(0.0);
                }
                ComponentParams::Link(_) => {
                    let p0 = at("p_set").unwrap_or(0.0);
                    let efficiency = at("efficiency").unwrap_or(1.0);
                    p[bus] -= p0;
                    if let Some(to) = component
                        .attachment
                        .secondary()
                        .and_then(|b| network.node_position(b.as_str()))
                    {
                        p[to] += efficiency * p0;
                    }
                }
                ComponentParams::Line(_) => {}
            }
        }
        (p, q)
    }
}

/// Solved state of one snapshot, per-unit.
pub(crate) struct SnapshotSolution {
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch: f64,
    pub v_mag: Vec<f64>,
    pub v_ang: Vec<f64>,
    pub p_bus: Vec<f64>,
    pub q_bus: Option<Vec<f64>>,
    /// `[p0, q0, p1, q1]` entering each line, ordered like `Topology::lines`
    pub line_flows: Vec<[f64; 4]>,
}

enum SystemMatrix {
    Admittance(ac::YBus),
    Susceptance(sprs::CsMat<f64>),
}

/// Run power flow over the whole snapshot index.
///
/// Hard errors are reserved for malformed input: no horizon, missing
/// set-points or invalid options. Divergence is reported in the returned
/// report.
pub fn run_power_flow(
    network: &Network,
    options: &PowerFlowOptions,
) -> NetworkResult<EvaluationReport> {
    options.validate()?;
    let index = network.horizon()?;
    let topology = Topology::build(network)?;
    let solver = options.linear_solver.build_solver();
    let base = options.base_mva;
    info!(
        method = options.method.as_str(),
        buses = network.nodes().len(),
        snapshots = index.len(),
        solver = solver.name(),
        "running power flow"
    );

    let mut diagnostics = Diagnostics::new();
    network.validate_into(&mut diagnostics);

    let system = match options.method {
        PowerFlowMethod::Ac => {
            SystemMatrix::Admittance(ac::build_y_bus(topology.bus_types.len(), &topology.lines))
        }
        PowerFlowMethod::Linear => SystemMatrix::Susceptance(linear::build_b_prime(&topology)),
    };
    let newton = ac::NewtonSettings {
        tolerance: options.tolerance,
        max_iterations: options.max_iterations,
        solver: solver.as_ref(),
    };

    let mut buffer = SeriesBuffer::new(index.len());
    declare_outputs(&mut buffer, network, options.method);
    let mut outcomes = Vec::with_capacity(index.len());

    for (t, snapshot) in index.iter() {
        let (p_mw, q_mvar) = topology.injections(network, t);
        let p_spec: Vec<f64> = p_mw.iter().map(|p| p / base).collect();
        let q_spec: Vec<f64> = q_mvar.iter().map(|q| q / base).collect();
        let solution = match &system {
            SystemMatrix::Admittance(y_bus) => {
                ac::solve_snapshot(&topology, y_bus, &p_spec, &q_spec, &newton)
            }
            SystemMatrix::Susceptance(b_prime) => {
                linear::solve_snapshot(&topology, b_prime, &p_spec, solver.as_ref())
            }
        };

        outcomes.push(SnapshotOutcome {
            snapshot: *snapshot,
            converged: solution.converged,
            iterations: solution.iterations,
            max_mismatch: solution.max_mismatch,
        });
        if !solution.converged {
            warn!(
                %snapshot,
                iterations = solution.iterations,
                max_mismatch = solution.max_mismatch,
                "power flow did not converge; results withheld"
            );
            diagnostics.add_warning_for(
                "convergence",
                &format!(
                    "did not converge after {} iteration(s), max mismatch {:.3e}",
                    solution.iterations, solution.max_mismatch
                ),
                &snapshot.to_string(),
            );
            continue;
        }
        record_snapshot(
            &mut buffer,
            network,
            &topology,
            &solution,
            &p_mw,
            &q_mvar,
            t,
            base,
        );
    }

    let solved = outcomes.iter().filter(|o| o.converged).count();
    let mut report = EvaluationReport::new(AnalysisKind::PowerFlow, diagnostics);
    report.snapshot_outcomes = outcomes;
    (report.status, report.condition) = if solved == index.len() {
        (Status::Ok, Condition::Converged)
    } else if solved > 0 {
        (Status::Warning, Condition::PartiallyConverged)
    } else {
        (Status::Warning, Condition::Diverged)
    };

    if solved > 0 {
        let mut result = EvaluationResult::new(
            AnalysisKind::PowerFlow,
            network.revision(),
            index.labels().to_vec(),
        );
        buffer.flush_into(&mut result);
        fill_nominal(&mut result, network);
        fill_energy(&mut result, network, index);
        fill_nodes(&mut result, network, index);
        report.result = Some(result);
    }
    info!(
        solved,
        snapshots = index.len(),
        condition = %report.condition,
        "power flow finished"
    );
    Ok(report)
}

fn declare_outputs(buffer: &mut SeriesBuffer, network: &Network, method: PowerFlowMethod) {
    let ac = method == PowerFlowMethod::Ac;
    for bus in network.nodes() {
        let id = bus.id.as_str();
        buffer.declare_node(id, "v_ang");
        buffer.declare_node(id, "p");
        if ac {
            buffer.declare_node(id, "v_mag_pu");
            buffer.declare_node(id, "q");
        }
    }
    for component in network.components() {
        let id = component.id.as_str();
        let attributes: &[&str] = match (component.kind(), ac) {
            (ComponentKind::Generator | ComponentKind::Load, true) => &["p", "q"],
            (ComponentKind::Generator | ComponentKind::Load, false) => &["p"],
            (ComponentKind::Line, true) => &["p0", "q0", "p1", "q1"],
            (ComponentKind::Line, false) | (ComponentKind::Link, _) => &["p0", "p1"],
            (ComponentKind::Storage, _) => &["p"],
        };
        for attribute in attributes {
            buffer.declare(id, attribute);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn record_snapshot(
    buffer: &mut SeriesBuffer,
    network: &Network,
    topology: &Topology,
    solution: &SnapshotSolution,
    p_mw: &[f64],
    q_mvar: &[f64],
    t: usize,
    base: f64,
) {
    for (i, bus) in network.nodes().iter().enumerate() {
        let id = bus.id.as_str();
        buffer.set_node(id, "v_ang", t, solution.v_ang[i]);
        buffer.set_node(id, "p", t, solution.p_bus[i] * base);
        if let Some(q_bus) = &solution.q_bus {
            buffer.set_node(id, "v_mag_pu", t, solution.v_mag[i]);
            buffer.set_node(id, "q", t, q_bus[i] * base);
        }
    }

    let components = network.components();
    for (position, component) in components.iter().enumerate() {
        let id = component.id.as_str();
        let Some(bus) = network.node_position(component.bus().as_str()) else {
            continue;
        };
        let at = |attribute: &str| network.attribute_at(component, attribute, t);
        match &component.params {
            ComponentParams::Generator(_) => {
                let role = topology.roles[position];
                let p = match role {
                    // Whatever the bus needs beyond the other specified injections
                    Some(GenRole::Slack) => solution.p_bus[bus] * base - p_mw[bus],
                    _ => at("p_set").unwrap_or(0.0),
                };
                buffer.set(id, "p", t, p);
                if let Some(q_bus) = &solution.q_bus {
                    let q = match role {
                        Some(GenRole::Fixed) | None => at("q_set").unwrap_or(0.0),
                        Some(_) => {
                            (q_bus[bus] * base - q_mvar[bus]) / topology.controllers[bus] as f64
                        }
                    };
                    buffer.set(id, "q", t, q);
                }
            }
            ComponentParams::Load(_) => {
                buffer.set(id, "p", t, at("p_set").unwrap_or(0.0));
                if solution.q_bus.is_some() {
                    buffer.set(id, "q", t, at("q_set").unwrap_or(0.0));
                }
            }
            ComponentParams::Storage(_) => {
                buffer.set(id, "p", t, at("p_set").unwrap_or(0.0));
            }
            ComponentParams::Link(_) => {
                let p0 = at("p_set").unwrap_or(0.0);
                buffer.set(id, "p0", t, p0);
                buffer.set(id, "p1", t, -at("efficiency").unwrap_or(1.0) * p0);
            }
            ComponentParams::Line(_) => {}
        }
    }

    for (line, flows) in topology.lines.iter().zip(&solution.line_flows) {
        let id = components[line.component].id.as_str();
        buffer.set(id, "p0", t, flows[0] * base);
        buffer.set(id, "p1", t, flows[2] * base);
        if solution.q_bus.is_some() {
            buffer.set(id, "q0", t, flows[1] * base);
            buffer.set(id, "q1", t, flows[3] * base);
        }
    }
}
