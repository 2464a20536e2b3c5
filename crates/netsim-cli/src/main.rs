use std::process::ExitCode;

use clap::Parser;
use netsim_cli::{load_config, Cli, Commands};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::evaluate::PowerFlowFlags;
use commands::{completions, evaluate, export, validate};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    let config = || load_config(cli.config.as_deref());
    let (name, result) = match &cli.command {
        Commands::Pf {
            input,
            method,
            tol,
            max_iter,
            solver,
            output,
        } => {
            let flags = PowerFlowFlags {
                method: method.as_deref(),
                tol: *tol,
                max_iter: *max_iter,
                solver: solver.as_deref(),
            };
            info!("Running power flow on {}", input.model.display());
            (
                "pf",
                config().and_then(|config| evaluate::power_flow(input, flags, output, &config)),
            )
        }
        Commands::Opf { input, lp, output } => {
            info!("Running operational optimization on {}", input.model.display());
            (
                "opf",
                config().and_then(|config| evaluate::operational(input, lp, output, &config)),
            )
        }
        Commands::Invest {
            input,
            periods,
            discount_rate,
            lp,
            output,
        } => {
            info!("Running investment optimization on {}", input.model.display());
            (
                "invest",
                config().and_then(|config| {
                    evaluate::investment(input, periods, *discount_rate, lp, output, &config)
                }),
            )
        }
        Commands::Validate { input } => ("validate", validate::handle(input)),
        Commands::Export { input, format, out } => {
            info!("Exporting {} as {:?} to {}", input.model.display(), format, out.display());
            ("export", export::handle(input, *format, out))
        }
        Commands::Completions { shell, out } => {
            ("completions", completions::handle(*shell, out.as_deref()))
        }
    };

    match result {
        Ok(()) => {
            info!("{name} command successful!");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{name} command failed: {err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
