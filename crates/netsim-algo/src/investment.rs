//! Investment optimization: capacity expansion over investment periods.
//!
//! Every period replays the operational horizon with the capacities installed
//! in that period. Components with an [`Extension`] get build (and optional
//! retire) decisions per period:
//!
//! ```text
//! cap_c,p = nom_c + Σ_{q≤p} b_c,q − Σ_{q≤p} r_c,q − Σ_{q≤p−L} b_c,q
//! nom_min ≤ cap_c,p ≤ nom_max
//!
//! min Σ_p δ_p · ( years_p · dispatch_cost_p + Σ_c capital_cost_c · b_c,p )
//! δ_p = (1 + r)^−(year_p − year_0)
//! ```
//!
//! `L` is `lifetime_periods`; a build stops counting `L` periods after it
//! was made. With `unit_size` set, `b` is an integer count of units.

use crate::lp::{LinearProgram, LpOutcome, RowSense, VarId};
use crate::opf::{apply_failure, Capacity, OperationalBlock, OptimizationOptions};
use crate::report::{
    fill_energy, fill_nodes, fill_nominal, nominal_column, Condition, EvaluationReport,
};
use crate::report::SeriesBuffer;
use netsim_core::{
    AnalysisKind, ComponentParams, Diagnostics, EvaluationResult, Extension, Network,
    NetworkError, NetworkResult,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPeriod {
    /// Calendar year the period starts in; also the result key suffix
    pub year: u32,
    /// Number of years the period stands for
    pub years: f64,
}

impl InvestmentPeriod {
    pub fn new(year: u32, years: f64) -> Self {
        Self { year, years }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPlan {
    pub periods: Vec<InvestmentPeriod>,
    #[serde(default)]
    pub discount_rate: f64,
}

impl InvestmentPlan {
    /// Checked constructor; see [`InvestmentPlan::validate`].
    pub fn new(periods: Vec<InvestmentPeriod>, discount_rate: f64) -> NetworkResult<Self> {
        let plan = Self {
            periods,
            discount_rate,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// One period of one year, no discounting.
    pub fn single(year: u32) -> Self {
        Self {
            periods: vec![InvestmentPeriod::new(year, 1.0)],
            discount_rate: 0.0,
        }
    }

    /// Periods must be non-empty, strictly increasing by year and span a
    /// positive number of years.
    pub fn validate(&self) -> NetworkResult<()> {
        if self.periods.is_empty() {
            return Err(NetworkError::InvalidHorizon(
                "investment plan has no periods".into(),
            ));
        }
        for pair in self.periods.windows(2) {
            if pair[1].year <= pair[0].year {
                return Err(NetworkError::InvalidHorizon(format!(
                    "investment periods must be strictly increasing, {} follows {}",
                    pair[1].year, pair[0].year
                )));
            }
        }
        if let Some(period) = self
            .periods
            .iter()
            .find(|p| !(p.years.is_finite() && p.years > 0.0))
        {
            return Err(NetworkError::InvalidHorizon(format!(
                "period {} spans {} years",
                period.year, period.years
            )));
        }
        if !(self.discount_rate.is_finite() && self.discount_rate >= 0.0) {
            return Err(NetworkError::invalid(
                "investment",
                "discount_rate",
                format!("must be non-negative, got {}", self.discount_rate),
            ));
        }
        Ok(())
    }

    /// `δ_p` per period, relative to the first period's year.
    pub fn discount_factors(&self) -> Vec<f64> {
        let first = self.periods.first().map_or(0, |p| p.year);
        self.periods
            .iter()
            .map(|p| (1.0 + self.discount_rate).powi(-(p.year.saturating_sub(first) as i32)))
            .collect()
    }
}

/// Capacity decisions of one extendable component.
struct Expansion {
    /// Position in `Network::components()`
    component: usize,
    /// `cap[p]`
    capacity: Vec<VarId>,
    /// `(build variable, capacity per unit)` per period
    builds: Vec<(VarId, f64)>,
}

fn add_expansion(
    lp: &mut LinearProgram,
    id: &str,
    component: usize,
    nominal: f64,
    extension: &Extension,
    plan: &InvestmentPlan,
    discount: &[f64],
) -> Expansion {
    let periods = plan.periods.len();
    let mut capacity = Vec::with_capacity(periods);
    let mut builds: Vec<(VarId, f64)> = Vec::with_capacity(periods);
    let mut retirements = Vec::with_capacity(periods);

    for (p, period) in plan.periods.iter().enumerate() {
        let year = period.year;
        let build = match extension.unit_size {
            Some(size) => (
                lp.add_integer_variable(format!("build[{id}]@{year}"), 0.0, f64::INFINITY),
                size,
            ),
            None => (
                lp.add_variable(format!("build[{id}]@{year}"), 0.0, f64::INFINITY),
                1.0,
            ),
        };
        lp.add_objective(build.0, discount[p] * extension.capital_cost * build.1);
        builds.push(build);
        if extension.allow_retirement {
            retirements.push(lp.add_variable(format!("retire[{id}]@{year}"), 0.0, f64::INFINITY));
        }

        let cap = lp.add_variable(
            format!("cap[{id}]@{year}"),
            extension.nom_min,
            extension.upper(),
        );
        let mut terms = vec![(cap, 1.0)];
        for (q, &(var, size)) in builds.iter().enumerate() {
            let expired = extension
                .lifetime_periods
                .is_some_and(|lifetime| q + lifetime <= p);
            if !expired {
                terms.push((var, -size));
            }
        }
        terms.extend(retirements.iter().map(|&var| (var, 1.0)));
        lp.add_row(format!("capacity[{id}]@{year}"), terms, RowSense::Eq, nominal);
        capacity.push(cap);
    }

    Expansion {
        component,
        capacity,
        builds,
    }
}

/// Joint capacity expansion and dispatch over every period of `plan`.
pub fn optimize_investment(
    network: &Network,
    plan: &InvestmentPlan,
    options: &OptimizationOptions,
) -> NetworkResult<EvaluationReport> {
    options.validate()?;
    plan.validate()?;
    let index = network.horizon()?;
    let mut diagnostics = Diagnostics::new();
    network.validate_into(&mut diagnostics);
    let discount = plan.discount_factors();

    let mut lp = LinearProgram::new();
    let mut expansions = Vec::new();
    for (position, component) in network.components().iter().enumerate() {
        let (Some(extension), Some((_, nominal))) =
            (component.params.extension(), component.params.nominal())
        else {
            continue;
        };
        expansions.push(add_expansion(
            &mut lp,
            component.id.as_str(),
            position,
            nominal,
            extension,
            plan,
            &discount,
        ));
    }
    if expansions.is_empty() {
        diagnostics.add_warning(
            "investment",
            "no component is extendable; only dispatch is optimised",
        );
    }

    let mut blocks = Vec::with_capacity(plan.periods.len());
    for (p, period) in plan.periods.iter().enumerate() {
        let mut capacities: Vec<Capacity> =
            network.components().iter().map(Capacity::of).collect();
        for expansion in &expansions {
            capacities[expansion.component] = Capacity::Variable(expansion.capacity[p]);
        }
        blocks.push(OperationalBlock::build(
            &mut lp,
            network,
            index,
            &capacities,
            discount[p] * period.years,
            &format!("{}:", period.year),
            options.base_mva,
        )?);
    }
    info!(
        solver = options.lp_solver.as_str(),
        periods = plan.periods.len(),
        extendable = expansions.len(),
        variables = lp.num_variables(),
        integers = lp.num_integers(),
        "running investment optimization"
    );

    let outcome = options
        .lp_solver
        .solve(&lp, &options.settings(), &mut diagnostics);
    let mut report = EvaluationReport::new(AnalysisKind::Investment, diagnostics);
    let LpOutcome::Optimal { values, objective } = &outcome else {
        apply_failure(&mut report, &outcome);
        return Ok(report);
    };

    let mut buffer = SeriesBuffer::new(index.len());
    for (block, period) in blocks.iter().zip(&plan.periods) {
        block.record(values, network, &mut buffer, Some(&period.year.to_string()));
    }
    if let Some(last) = blocks.last() {
        last.record(values, network, &mut buffer, None);
    }

    let mut result = EvaluationResult::new(
        AnalysisKind::Investment,
        network.revision(),
        index.labels().to_vec(),
    );
    buffer.flush_into(&mut result);
    fill_nominal(&mut result, network);
    for component in network.components() {
        let Some((_, nominal)) = component.params.nominal() else {
            continue;
        };
        let table = result.static_table_mut(component.kind());
        for period in &plan.periods {
            table.set(
                component.id.as_str(),
                &format!("nom_opt@{}", period.year),
                nominal,
            );
        }
    }
    for expansion in &expansions {
        let component = &network.components()[expansion.component];
        let id = component.id.as_str();
        let table = result.static_table_mut(component.kind());
        for (period, &cap) in plan.periods.iter().zip(&expansion.capacity) {
            table.set(id, &format!("nom_opt@{}", period.year), values[cap.index()]);
        }
        for (period, &(build, size)) in plan.periods.iter().zip(&expansion.builds) {
            table.set(id, &format!("build@{}", period.year), values[build.index()] * size);
        }
        let Some(&last) = expansion.capacity.last() else {
            continue;
        };
        let installed = values[last.index()];
        if let Some(column) = nominal_column(&component.params) {
            table.set(id, column, installed);
        }
        if let ComponentParams::Storage(storage) = &component.params {
            if let Some(hours) = storage.max_hours() {
                table.set(id, "p_nom_opt", installed / hours);
            }
        }
        debug!(component = id, installed, "expansion decided");
    }
    fill_energy(&mut result, network, index);
    fill_nodes(&mut result, network, index);
    result.objective = Some(*objective);

    report.condition = Condition::Optimal;
    report.objective = Some(*objective);
    report.result = Some(result);
    info!(objective, "investment optimization finished");
    Ok(report)
}
