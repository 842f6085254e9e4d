//! `forestmark` command-line entry point

use anyhow::Context;
use forestmark::cli::{self, Action, Cli};
use forestmark::{extract, logging, run, run_sweep, ScenarioRegistry};
use std::io;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let registry = ScenarioRegistry::with_defaults();
    // usage errors print help and exit with status 2
    let matches = cli::command(&registry).get_matches();

    let cli = match Cli::from_matches(&registry, &matches) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("forestmark: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&cli.log_level, cli.log_format) {
        eprintln!("forestmark: {e}");
        return ExitCode::FAILURE;
    }

    match execute(&registry, cli.action) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(registry: &ScenarioRegistry, action: Action) -> anyhow::Result<()> {
    match action {
        Action::Run(config) => {
            let outcome = run(&config, registry)?;
            info!(
                path = %outcome.results_path.display(),
                elements = outcome.num_elements,
                throughput = outcome.record.throughput,
                "benchmark finished"
            );
        }
        Action::Sweep { plan, base } => {
            let summary = run_sweep(&plan, &base, registry)?;
            if summary.failed > 0 {
                anyhow::bail!("{} of {} sweep points failed", summary.failed, summary.completed + summary.failed);
            }
        }
        Action::Extract { plan, base } => {
            let rows = extract(&plan, &base, &mut io::stdout().lock(), &mut io::stderr().lock())
                .with_context(|| format!("cannot extract results under {}", base.display()))?;
            info!(rows, "results extracted");
        }
    }
    Ok(())
}
