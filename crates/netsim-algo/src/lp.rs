//! Explicit linear programs and the backends that solve them.
//!
//! Formulations build a [`LinearProgram`] (variables with bounds and
//! integrality, a linear objective, sparse constraint rows). A backend
//! selected through [`LpSolverKind`] translates it to `good_lp`, solves it and
//! hands back an [`LpOutcome`]: a termination condition plus, on success, one
//! value per variable.

use anyhow::anyhow;
#[cfg(feature = "solver-clarabel")]
use good_lp::solvers::clarabel::clarabel as clarabel_solver;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs as highs_solver;
use good_lp::{
    constraint, variable, Constraint, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use netsim_core::Diagnostics;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use std::str::FromStr;

#[cfg(not(any(feature = "solver-clarabel", feature = "solver-highs")))]
compile_error!("netsim-algo needs an LP backend: enable `solver-clarabel` or `solver-highs`");
use tracing::{debug, warn};

/// Handle of a variable inside one [`LinearProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpVariable {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    pub integer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    Le,
    Eq,
    Ge,
}

/// One constraint row: `Σ coeff·var  <sense>  rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LpRow {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

/// Minimisation problem in explicit form.
#[derive(Debug, Clone, Default)]
pub struct LinearProgram {
    variables: Vec<LpVariable>,
    objective: Vec<f64>,
    rows: Vec<LpRow>,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continuous variable; infinite bounds leave that side free.
    pub fn add_variable(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.push_variable(name.into(), lower, upper, false)
    }

    pub fn add_integer_variable(
        &mut self,
        name: impl Into<String>,
        lower: f64,
        upper: f64,
    ) -> VarId {
        self.push_variable(name.into(), lower, upper, true)
    }

    fn push_variable(&mut self, name: String, lower: f64, upper: f64, integer: bool) -> VarId {
        self.variables.push(LpVariable {
            name,
            lower,
            upper,
            integer,
        });
        self.objective.push(0.0);
        VarId(self.variables.len() - 1)
    }

    /// Add `coeff` to the objective coefficient of `var`.
    pub fn add_objective(&mut self, var: VarId, coeff: f64) {
        self.objective[var.0] += coeff;
    }

    /// Append a row. Zero coefficients are dropped. Returns the row index.
    pub fn add_row(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        sense: RowSense,
        rhs: f64,
    ) -> usize {
        let terms = terms.into_iter().filter(|(_, c)| *c != 0.0).collect();
        self.rows.push(LpRow {
            name: name.into(),
            terms,
            sense,
            rhs,
        });
        self.rows.len() - 1
    }

    pub fn variables(&self) -> &[LpVariable] {
        &self.variables
    }

    pub fn variable(&self, var: VarId) -> &LpVariable {
        &self.variables[var.0]
    }

    pub fn rows(&self) -> &[LpRow] {
        &self.rows
    }

    pub fn objective(&self) -> &[f64] {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_integers(&self) -> usize {
        self.variables.iter().filter(|v| v.integer).count()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .zip(values)
            .map(|(c, x)| c * x)
            .sum()
    }

    /// Constraint matrix in CSR form (rows × variables).
    pub fn constraint_matrix(&self) -> CsMat<f64> {
        let mut triplets = TriMat::new((self.rows.len(), self.variables.len()));
        for (r, row) in self.rows.iter().enumerate() {
            for (var, coeff) in &row.terms {
                triplets.add_triplet(r, var.0, *coeff);
            }
        }
        triplets.to_csr()
    }

    /// Largest bound or row violation of a candidate point.
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        let mut worst: f64 = 0.0;
        for (var, x) in self.variables.iter().zip(values) {
            worst = worst.max(var.lower - x).max(x - var.upper);
        }
        let matrix = self.constraint_matrix();
        for (row, lhs_row) in self.rows.iter().zip(matrix.outer_iterator()) {
            let lhs: f64 = lhs_row.iter().map(|(j, a)| a * values[j]).sum();
            let violation = match row.sense {
                RowSense::Le => lhs - row.rhs,
                RowSense::Ge => row.rhs - lhs,
                RowSense::Eq => (lhs - row.rhs).abs(),
            };
            worst = worst.max(violation);
        }
        worst
    }
}

/// Termination of one LP solve.
#[derive(Debug, Clone, PartialEq)]
pub enum LpOutcome {
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
    Unbounded,
    Failed(String),
}

/// Backend settings that are not part of the formulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LpSettings {
    /// Relative MIP gap for backends with integer support
    pub mip_gap: f64,
}

impl Default for LpSettings {
    fn default() -> Self {
        Self { mip_gap: 1e-4 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LpSolverKind {
    #[cfg(feature = "solver-clarabel")]
    #[default]
    Clarabel,
    #[cfg(feature = "solver-highs")]
    #[cfg_attr(not(feature = "solver-clarabel"), default)]
    Highs,
}

impl LpSolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            #[cfg(feature = "solver-clarabel")]
            LpSolverKind::Clarabel => "clarabel",
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => "highs",
        }
    }

    /// Whether integer variables are honoured rather than relaxed.
    pub fn supports_integers(&self) -> bool {
        match self {
            #[cfg(feature = "solver-clarabel")]
            LpSolverKind::Clarabel => false,
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => true,
        }
    }

    /// Solve `lp`. Integer variables are relaxed, with a diagnostic, on
    /// backends without integer support.
    #[cfg_attr(not(feature = "solver-highs"), allow(unused_variables))]
    pub fn solve(
        &self,
        lp: &LinearProgram,
        settings: &LpSettings,
        diag: &mut Diagnostics,
    ) -> LpOutcome {
        let integers = lp.num_integers();
        let keep_integers = self.supports_integers();
        if integers > 0 && !keep_integers {
            warn!(
                solver = self.as_str(),
                integers, "relaxing integer variables to continuous"
            );
            diag.add_warning(
                "solver",
                &format!(
                    "{} relaxes {integers} integer variable(s) to continuous values",
                    self.as_str()
                ),
            );
        }
        if lp.num_variables() == 0 {
            return LpOutcome::Optimal {
                values: Vec::new(),
                objective: 0.0,
            };
        }

        debug!(
            solver = self.as_str(),
            variables = lp.num_variables(),
            rows = lp.num_rows(),
            "solving linear program"
        );
        let translated = Translated::new(lp, keep_integers);
        let handles = translated.handles;
        match self {
            #[cfg(feature = "solver-clarabel")]
            LpSolverKind::Clarabel => {
                let problem = translated
                    .vars
                    .minimise(translated.objective)
                    .using(clarabel_solver);
                extract(lp, add_rows(problem, translated.constraints).solve(), &handles)
            }
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => {
                let problem = translated
                    .vars
                    .minimise(translated.objective)
                    .using(highs_solver)
                    .set_option("mip_rel_gap", settings.mip_gap);
                extract(lp, add_rows(problem, translated.constraints).solve(), &handles)
            }
        }
    }
}

const AVAILABLE_LP_SOLVERS: &[&str] = &[
    #[cfg(feature = "solver-clarabel")]
    "clarabel",
    #[cfg(feature = "solver-highs")]
    "highs",
];

fn unknown_solver_error(label: &str) -> anyhow::Error {
    anyhow!(
        "unknown lp solver '{}'; supported values: {}",
        label,
        LpSolverKind::available().join(", ")
    )
}

impl FromStr for LpSolverKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "clarabel" => {
                #[cfg(feature = "solver-clarabel")]
                {
                    Ok(LpSolverKind::Clarabel)
                }
                #[cfg(not(feature = "solver-clarabel"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            "highs" => {
                #[cfg(feature = "solver-highs")]
                {
                    Ok(LpSolverKind::Highs)
                }
                #[cfg(not(feature = "solver-highs"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            other => Err(unknown_solver_error(other)),
        }
    }
}

/// `good_lp` rendition of a [`LinearProgram`].
struct Translated {
    vars: ProblemVariables,
    handles: Vec<Variable>,
    objective: Expression,
    constraints: Vec<Constraint>,
}

impl Translated {
    fn new(lp: &LinearProgram, keep_integers: bool) -> Self {
        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = lp
            .variables
            .iter()
            .map(|v| {
                let mut definition = variable();
                if v.lower.is_finite() {
                    definition = definition.min(v.lower);
                }
                if v.upper.is_finite() {
                    definition = definition.max(v.upper);
                }
                if v.integer && keep_integers {
                    definition = definition.integer();
                }
                vars.add(definition)
            })
            .collect();

        let objective = lp
            .objective
            .iter()
            .zip(&handles)
            .filter(|(c, _)| **c != 0.0)
            .fold(Expression::from(0.0), |acc, (c, v)| acc + *c * *v);

        let constraints = lp
            .rows
            .iter()
            .map(|row| {
                let lhs = row
                    .terms
                    .iter()
                    .fold(Expression::from(0.0), |acc, (var, c)| acc + *c * handles[var.0]);
                match row.sense {
                    RowSense::Le => constraint!(lhs <= row.rhs),
                    RowSense::Eq => constraint!(lhs == row.rhs),
                    RowSense::Ge => constraint!(lhs >= row.rhs),
                }
            })
            .collect();

        Self {
            vars,
            handles,
            objective,
            constraints,
        }
    }
}

fn add_rows<M: SolverModel>(mut problem: M, constraints: Vec<Constraint>) -> M {
    for row in constraints {
        problem = problem.with(row);
    }
    problem
}

fn extract<S: Solution>(
    lp: &LinearProgram,
    solved: Result<S, ResolutionError>,
    handles: &[Variable],
) -> LpOutcome {
    match solved {
        Ok(solution) => {
            let values: Vec<f64> = handles.iter().map(|v| solution.value(*v)).collect();
            if values.iter().any(|v| !v.is_finite()) {
                return LpOutcome::Failed("solver returned non-finite values".into());
            }
            debug!(violation = lp.max_violation(&values), "lp solution");
            LpOutcome::Optimal {
                objective: lp.objective_value(&values),
                values,
            }
        }
        Err(ResolutionError::Infeasible) => LpOutcome::Infeasible,
        Err(ResolutionError::Unbounded) => LpOutcome::Unbounded,
        Err(other) => LpOutcome::Failed(other.to_string()),
    }
}
