use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cvae_report::{config::Config, error::FinanceError, run, Result, RunOptions};

const MISSING_ROSTER_EXIT_CODE: u8 = 6;

/// Aggregates company financial workbooks and estimates their CVAE.
#[derive(Parser)]
#[command(name = "cvae-report", version, about)]
struct Cli {
    /// Directory holding the roster and one sub-directory per company
    #[arg(default_value = ".")]
    base_dir: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Persisted metric store (default: <BASE_DIR>/finances.json)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Re-read every workbook even if a persisted store exists
    #[arg(long)]
    rebuild: bool,

    /// Report workbook (default: <BASE_DIR>/rapport.xlsx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the metric store as CSV
    #[arg(long)]
    detail_csv: Option<PathBuf>,

    /// Take debt cost figures from the "coût du capital" sheet of this workbook
    #[arg(long)]
    capital_workbook: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let options = RunOptions {
        store_path: cli
            .store
            .unwrap_or_else(|| cli.base_dir.join("finances.json")),
        output: cli
            .output
            .unwrap_or_else(|| cli.base_dir.join("rapport.xlsx")),
        rebuild: cli.rebuild,
        detail_csv: cli.detail_csv,
        capital_workbook: cli.capital_workbook,
        base_dir: cli.base_dir,
    };

    let summary = run(&config, &options)?;
    info!(
        "{} companies, {} workbooks read, {} skipped, {} values, {} sheets{}",
        summary.companies,
        summary.sources_read,
        summary.sources_skipped,
        summary.values,
        summary.sheets,
        if summary.reloaded { " (store reloaded)" } else { "" }
    );
    Ok(())
}

/// Process exit code for a failed run.
fn exit_code(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<FinanceError>() {
        Some(FinanceError::MissingRoster(_)) => MISSING_ROSTER_EXIT_CODE,
        _ => 1,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}
