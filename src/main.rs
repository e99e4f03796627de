#![allow(clippy::result_large_err)]

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use miette::Diagnostic;
use miette::Result;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use apidiff::outputter::OutPutter;
use apidiff::parser::Format;
use apidiff::parser::ParseError;
use apidiff::parser::TestSuite;
use apidiff::report::SuiteReport;
use apidiff::runner::HttpFetcher;
use apidiff::runner::RunEvent;
use apidiff::runner::RunOptions;
use apidiff::runner::run_tests;
use apidiff::validator::SuitePlan;
use apidiff::validator::ValidationError;
use apidiff::validator::Validator;

use crate::cli::Cli;

mod cli;

#[derive(Error, Debug, Diagnostic)]
pub enum ApiDiffError {
    #[error("Failed to read test suite file")]
    FileError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parsing(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("Failed to build the http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to write the json report: {0}")]
    ReportError(String),
}

/// Reads the suite file named on the command line and validates it.
///
/// # Errors
/// Returns an `ApiDiffError` if the file cannot be read, does not parse, or
/// fails validation. Nothing has been sent to either backend at that point.
fn load_and_validate_config(cli: &Cli) -> Result<SuitePlan, ApiDiffError> {
    let contents = std::fs::read_to_string(&cli.path).map_err(ApiDiffError::FileError)?;
    let format = Format::from_path(Path::new(&cli.path));
    let suite = TestSuite::parse(&contents, format, &cli.path)?;

    let plan = Validator::new(&suite, &contents, &cli.path)
        .validate()
        .map_err(ApiDiffError::ValidationError)?;

    Ok(plan)
}

/// Logs go to stderr so they never interleave with the report on stdout.
/// `RUST_LOG` wins over `--debug`.
fn init_tracing(debug: bool) {
    let default = if debug { "warn,apidiff=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn write_json_report(path: &Path, report: &SuiteReport) -> Result<(), ApiDiffError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| ApiDiffError::ReportError(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| ApiDiffError::ReportError(e.to_string()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let plan = load_and_validate_config(&cli)?;
    let n_tests = plan.tests.len();

    let options = RunOptions {
        print_responses: cli.print,
        timeout: Duration::from_secs(cli.timeout),
    };
    let fetcher = HttpFetcher::new(options.timeout).map_err(ApiDiffError::HttpClient)?;

    // Ctrl-C lets the case in flight finish as an error and skips the rest
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let (runner_tx, outputter_rx) = flume::unbounded::<RunEvent>();
    let suite_path = cli.path.clone();
    let outputter_handle = tokio::spawn(async move {
        OutPutter::start(outputter_rx, &suite_path, n_tests).await;
    });

    let report = run_tests(&plan, &fetcher, &options, cancel_rx, runner_tx).await;
    let _ = outputter_handle.await;
    let tally = report.tally();
    debug!(
        total = tally.total(),
        passed = tally.passed,
        interrupted = report.interrupted,
        "run finished"
    );

    if let Some(json_path) = &cli.json {
        write_json_report(json_path, &report)?;
    }

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
