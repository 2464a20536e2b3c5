//! # netsim-algo: evaluation of netsim models
//!
//! Three analysis modes run against a [`netsim_core::Network`]:
//!
//! | Mode | Entry point | Problem class |
//! |------|-------------|---------------|
//! | Power flow | [`run_power_flow`] | Nonlinear (Newton-Raphson) or linear |
//! | Operational optimization | [`optimize_operations`] | LP |
//! | Investment optimization | [`optimize_investment`] | LP / MILP |
//!
//! Each entry point borrows the network read-only and returns an
//! [`EvaluationReport`]. [`Evaluator::evaluate`] additionally stores the
//! result on the network so it can be read back through
//! `Network::read_static` and `Network::read_timeseries`.
//!
//! ## Outcomes
//!
//! Malformed input (missing horizon, missing set-points, bad options) is a
//! hard [`netsim_core::NetworkError`]. Divergence and infeasibility are soft:
//! the report carries `Status::Warning` and a [`Condition`], and
//! [`EvaluationReport::check`] turns them into errors on request.
//!
//! ## Solvers
//!
//! Linear programs are built as explicit [`LinearProgram`]s and solved through
//! `good_lp`: Clarabel by default, HiGHS with the `solver-highs` feature.
//!
//! ## Example
//!
//! ```no_run
//! use netsim_algo::{AnalysisMode, Evaluator, PowerFlowOptions};
//! use netsim_core::Network;
//!
//! # fn demo(network: &mut Network) -> netsim_core::NetworkResult<()> {
//! let report = Evaluator::evaluate(network, &AnalysisMode::PowerFlow(PowerFlowOptions::default()))?;
//! println!("{report}");
//! let slack = network.read_timeseries("gen", "p")?;
//! # Ok(())
//! # }
//! ```

pub mod evaluator;
pub mod investment;
pub mod lp;
pub mod opf;
pub mod power_flow;
pub mod report;

pub use evaluator::{AnalysisMode, Evaluator};
pub use investment::{optimize_investment, InvestmentPeriod, InvestmentPlan};
pub use lp::{LinearProgram, LpOutcome, LpSettings, LpSolverKind, RowSense, VarId};
pub use opf::{optimize_operations, OptimizationOptions};
pub use power_flow::{run_power_flow, PowerFlowMethod, PowerFlowOptions};
pub use report::{Condition, EvaluationReport, SnapshotOutcome, Status};
