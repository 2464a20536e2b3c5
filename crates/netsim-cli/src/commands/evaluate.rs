//! `pf`, `opf` and `invest`.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use netsim_algo::{
    AnalysisMode, EvaluationReport, Evaluator, InvestmentPeriod, InvestmentPlan, LpSolverKind,
    OptimizationOptions, PowerFlowMethod, PowerFlowOptions,
};
use netsim_cli::cli::{LpArgs, ModelArgs, OutputArgs, ResultFormat};
use netsim_cli::{load_model, NetsimConfig};
use netsim_core::{solver::SolverKind, Network};
use tracing::{info, warn};

pub struct PowerFlowFlags<'a> {
    pub method: Option<&'a str>,
    pub tol: Option<f64>,
    pub max_iter: Option<usize>,
    pub solver: Option<&'a str>,
}

pub fn power_flow(
    input: &ModelArgs,
    flags: PowerFlowFlags<'_>,
    output: &OutputArgs,
    config: &NetsimConfig,
) -> Result<()> {
    let mut options = config.power_flow.clone();
    if let Some(method) = flags.method {
        options.method = method.parse::<PowerFlowMethod>()?;
    }
    if let Some(tol) = flags.tol {
        options = options.with_tolerance(tol);
    }
    if let Some(max_iter) = flags.max_iter {
        options = options.with_max_iterations(max_iter);
    }
    if let Some(solver) = flags.solver {
        options = options.with_linear_solver(solver.parse::<SolverKind>()?);
    }
    let mut network = load_model(&input.model, input.model_json)?.network;
    run(&mut network, &AnalysisMode::PowerFlow(options), output)
}

pub fn operational(
    input: &ModelArgs,
    lp: &LpArgs,
    output: &OutputArgs,
    config: &NetsimConfig,
) -> Result<()> {
    let options = optimization_options(lp, config)?;
    let mut network = load_model(&input.model, input.model_json)?.network;
    run(&mut network, &AnalysisMode::Operational(options), output)
}

pub fn investment(
    input: &ModelArgs,
    periods: &[String],
    discount_rate: f64,
    lp: &LpArgs,
    output: &OutputArgs,
    config: &NetsimConfig,
) -> Result<()> {
    let options = optimization_options(lp, config)?;
    let model = load_model(&input.model, input.model_json)?;
    let plan = if periods.is_empty() {
        match model.plan {
            Some(plan) => plan,
            None => bail!(
                "no investment plan: add an `investment` section to the study or pass --period"
            ),
        }
    } else {
        let periods = periods
            .iter()
            .map(|spec| parse_period(spec))
            .collect::<Result<Vec<_>>>()?;
        InvestmentPlan::new(periods, discount_rate)?
    };
    let mut network = model.network;
    run(
        &mut network,
        &AnalysisMode::Investment { plan, options },
        output,
    )
}

fn optimization_options(lp: &LpArgs, config: &NetsimConfig) -> Result<OptimizationOptions> {
    let mut options = config.optimization.clone();
    if let Some(solver) = &lp.lp_solver {
        options = options.with_solver(solver.parse::<LpSolverKind>()?);
    }
    if let Some(gap) = lp.mip_gap {
        options.mip_gap = gap;
    }
    Ok(options)
}

/// `2030` (one year) or `2030:5`.
fn parse_period(spec: &str) -> Result<InvestmentPeriod> {
    let (year, years) = match spec.split_once(':') {
        Some((year, years)) => (year, years),
        None => (spec, "1"),
    };
    let year = year
        .trim()
        .parse::<u32>()
        .with_context(|| format!("period '{spec}': invalid year"))?;
    let years = years
        .trim()
        .parse::<f64>()
        .with_context(|| format!("period '{spec}': invalid number of years"))?;
    Ok(InvestmentPeriod::new(year, years))
}

fn run(network: &mut Network, mode: &AnalysisMode, output: &OutputArgs) -> Result<()> {
    info!(network = %network.name(), stats = %network.stats(), "evaluating");
    let report = Evaluator::evaluate(network, mode)?;

    if output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serializing report")?
        );
    } else {
        print_report(&report);
    }
    if output.strict {
        report.check()?;
    }

    if let Some(dir) = &output.out {
        if network.result().is_ok() {
            write_result(network, dir, output.out_format)?;
            info!(out = %dir.display(), "wrote result");
        } else {
            warn!("no result to write ({})", report.condition);
        }
    }
    Ok(())
}

fn print_report(report: &EvaluationReport) {
    println!("{}: {} ({})", report.mode, report.status, report.condition);
    if let Some(objective) = report.objective {
        println!("objective: {objective:.6}");
    }
    if let Some(result) = &report.result {
        println!(
            "snapshots: {}/{} solved",
            result.solved_snapshots(),
            result.snapshots.len()
        );
    }
    print!("{}", report.diagnostics);
}

fn write_result(network: &Network, dir: &Path, format: ResultFormat) -> Result<()> {
    match format {
        ResultFormat::Csv => netsim_io::export_result_csv(network, dir),
        ResultFormat::Json => {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            netsim_io::export_result_json(network, &dir.join("result.json"))
        }
        #[cfg(feature = "parquet")]
        ResultFormat::Parquet => netsim_io::export_result_parquet(network, dir),
    }
}
