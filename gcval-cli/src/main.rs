//! validate-scientific-results - compare GEOS-Chem runs made on different architectures
//!
//! Loads a reference run and a test run, compares the requested species in every file the two
//! runs share, and writes CSV, Markdown, HTML and JSON reports with diagnostic plots. The process
//! exits non-zero if any comparison fails, so it can gate a CI pipeline.

mod config;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{FileConfig, RunConfig, ValidateArgs};
use gcval::{DatasetCatalog, DirectorySink, Report, Settings};

const LOG_FILE: &str = "validation-results.log";

#[derive(Parser, Debug)]
#[command(name = "validate-scientific-results")]
#[command(about = "Validate scientific results between GEOS-Chem runs on different architectures")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    validate: ValidateArgs,

    /// Log debug detail
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the variable catalog of every dataset in a run directory as JSON
    Inspect {
        /// Run directory to inspect
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Some(Command::Inspect { dir }) => {
            init_logging(cli.verbose, None);
            inspect(&dir)
        }
        None => match prepare(cli.validate) {
            Ok(run) => {
                init_logging(cli.verbose, Some(&run.output.join(LOG_FILE)));
                validate(run)
            }
            Err(err) => {
                eprintln!("Error: {err:#}");
                return ExitCode::FAILURE;
            }
        },
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr and, if given, to a file.
///
/// `RUST_LOG` overrides the default filter unless `verbose` is set. If the log file can't be
/// created, logging goes to stderr only.
///
fn init_logging(verbose: bool, log_file: Option<&Path>) {
    let filter = if verbose {
        EnvFilter::new("gcval=debug,validate_scientific_results=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gcval=info,validate_scientific_results=info"))
    };

    let mut unavailable = None;
    let file_layer = log_file.and_then(|path| match File::create(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        ),
        Err(err) => {
            unavailable = Some(format!("Unable to create log file {}: {err}", path.display()));
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    if let Some(message) = unavailable {
        warn!("{message}");
    }
}

/// Settle the run's configuration and make sure its output directory exists.
///
fn prepare(args: ValidateArgs) -> Result<RunConfig> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let run = args.resolve(file)?;

    fs::create_dir_all(&run.output)
        .with_context(|| format!("unable to create output directory {}", run.output.display()))?;

    Ok(run)
}

fn validate(run: RunConfig) -> Result<ExitCode> {
    info!("Starting scientific validation");
    info!("Reference data: {}", run.reference.display());
    info!("Test data: {}", run.test.display());
    info!("Output directory: {}", run.output.display());

    let reader = gcval::default_reader(Some(&run.options.species))?;
    let reference = gcval::load_run(&run.reference, reader.as_ref())
        .context("unable to load reference run")?;
    let test = gcval::load_run(&run.test, reader.as_ref()).context("unable to load test run")?;

    let outcome = gcval::validate(&reference, &test, &run.options);
    let settings = Settings::new(&run.reference, &run.test, &run.options);
    let report = Report::new(settings, outcome);

    let sink = DirectorySink::new(&run.output)?;
    report.publish(&sink)?;

    let summary = report.summary();
    info!(
        "Validation summary: {} of {} tests passed",
        summary.passed, summary.total
    );
    if report.outcome.all_passed() {
        info!("All validation tests PASSED");
    } else {
        error!("{} validation tests FAILED", summary.failed);
    }

    Ok(ExitCode::from(
        u8::try_from(report.outcome.exit_code()).unwrap_or(1),
    ))
}

fn inspect(dir: &Path) -> Result<ExitCode> {
    let reader = gcval::default_reader(None)?;
    let run = gcval::load_run(dir, reader.as_ref())?;
    let catalogs: Vec<DatasetCatalog> = run.values().map(gcval::catalog).collect();

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &catalogs)?;
    writeln!(stdout)?;

    Ok(ExitCode::SUCCESS)
}
