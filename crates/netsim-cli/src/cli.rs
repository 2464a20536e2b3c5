use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "netsim", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    /// Configuration file (defaults to ~/.netsim/config.toml)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Non-linear (AC) or linearized power flow over every snapshot
    Pf {
        #[command(flatten)]
        input: ModelArgs,
        /// Solution method (ac, linear)
        #[arg(long)]
        method: Option<String>,
        /// Convergence tolerance on the power mismatch (p.u.)
        #[arg(long)]
        tol: Option<f64>,
        /// Newton-Raphson iteration limit
        #[arg(long)]
        max_iter: Option<usize>,
        /// Linear system backend (gauss, faer)
        #[arg(long)]
        solver: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Least-cost dispatch over the snapshot horizon
    Opf {
        #[command(flatten)]
        input: ModelArgs,
        #[command(flatten)]
        lp: LpArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Capacity expansion over the investment periods of a study
    Invest {
        #[command(flatten)]
        input: ModelArgs,
        /// Investment period as YEAR or YEAR:YEARS, repeatable (overrides the study plan)
        #[arg(long = "period")]
        periods: Vec<String>,
        /// Discount rate applied to the periods given with --period
        #[arg(long, default_value_t = 0.0)]
        discount_rate: f64,
        #[command(flatten)]
        lp: LpArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Build the model and report structural diagnostics
    Validate {
        #[command(flatten)]
        input: ModelArgs,
    },
    /// Write the model as a CSV folder or a JSON document
    Export {
        #[command(flatten)]
        input: ModelArgs,
        #[arg(long, value_enum, default_value_t = ModelFormat::Csv)]
        format: ModelFormat,
        /// Destination folder (csv) or file (json)
        #[arg(short, long, value_hint = ValueHint::AnyPath)]
        out: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
pub struct ModelArgs {
    /// Study file (.yaml/.json), exported model folder, or model JSON (.json with --model-json)
    #[arg(value_hint = ValueHint::AnyPath)]
    pub model: PathBuf,
    /// Treat a .json input as an exported model rather than a study
    #[arg(long)]
    pub model_json: bool,
}

#[derive(clap::Args, Debug)]
pub struct LpArgs {
    /// LP backend (clarabel, highs)
    #[arg(long)]
    pub lp_solver: Option<String>,
    /// Relative MIP gap for backends with integer support
    #[arg(long)]
    pub mip_gap: Option<f64>,
}

#[derive(clap::Args, Debug)]
pub struct OutputArgs {
    /// Write the result tables into this folder
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub out: Option<PathBuf>,
    /// Result file format
    #[arg(long, value_enum, default_value_t = ResultFormat::Csv)]
    pub out_format: ResultFormat,
    /// Print the evaluation report as JSON instead of text
    #[arg(long)]
    pub json: bool,
    /// Exit with an error on divergence, infeasibility or solver failure
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResultFormat {
    Csv,
    Json,
    #[cfg(feature = "parquet")]
    Parquet,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        build_cli_command().debug_assert();
    }

    #[test]
    fn parses_power_flow_flags() {
        let cli = Cli::parse_from([
            "netsim", "pf", "ring.yaml", "--method", "linear", "--tol", "1e-8", "--json",
        ]);
        match cli.command {
            Commands::Pf {
                input,
                method,
                tol,
                output,
                ..
            } => {
                assert_eq!(input.model, PathBuf::from("ring.yaml"));
                assert_eq!(method.as_deref(), Some("linear"));
                assert_eq!(tol, Some(1e-8));
                assert!(output.json);
                assert_eq!(output.out_format, ResultFormat::Csv);
            }
            other => panic!("parsed {other:?}"),
        }
    }

    #[test]
    fn periods_repeat() {
        let cli = Cli::parse_from([
            "netsim", "invest", "s.yaml", "--period", "2030:5", "--period", "2035",
        ]);
        match cli.command {
            Commands::Invest { periods, .. } => assert_eq!(periods, ["2030:5", "2035"]),
            other => panic!("parsed {other:?}"),
        }
    }
}
