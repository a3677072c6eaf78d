//! Annox: computer-vision annotation exchange.
//!
//! Annox reads and writes annotation datasets (boxes, polygons, masks,
//! keypoints, panoptic segments) through a canonical intermediate
//! representation, so every format only needs a reader and a writer for the
//! IR rather than one converter per format pair.
//!
//! # Modules
//!
//! - [`ir`]: The canonical model, geometry types and format readers/writers
//! - [`adapter`]: The format adapter contract and the built-in registry
//! - [`validation`]: Dataset validation and error reporting
//! - [`conversion`]: Format conversion with a lossiness report
//! - [`parallel`]: Order-preserving parallel map used by validation
//! - [`error`]: Error types for annox operations

pub mod adapter;
pub mod conversion;
pub mod error;
pub mod ir;
pub mod parallel;
pub mod validation;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use adapter::AdapterRegistry;
pub use error::AnnoxError;
use validation::ValidationReport;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "ANNOX_LOG";

/// The annox CLI application.
#[derive(Parser)]
#[command(name = "annox")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Log debug detail to stderr (overridden by ANNOX_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Validate a canonical dataset file or a .jsonl item stream.
    Validate(ValidateArgs),
    /// List the registered formats and their capabilities.
    ListFormats,
    /// Convert a dataset between formats.
    Convert(ConvertArgs),
}

/// Arguments for the validate subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Dataset file to validate.
    input: PathBuf,

    /// Worker threads for per-item checks (0 = in-process).
    #[arg(long, env = "ANNOX_WORKERS", default_value_t = 0)]
    workers: usize,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = ReportOutput::Text)]
    output: ReportOutput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportOutput {
    Text,
    Json,
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    /// Source format name or alias.
    #[arg(long = "from")]
    from: String,

    /// Target format name or alias.
    #[arg(long = "to")]
    to: String,

    /// Source path (file or directory, per format).
    #[arg(long)]
    src: PathBuf,

    /// Destination path (file or directory, per format).
    #[arg(long)]
    dst: PathBuf,
}

/// Run the annox CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), AnnoxError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Validate(args)) => run_validate(args),
        Some(Commands::ListFormats) => run_list_formats(),
        Some(Commands::Convert(args)) => run_convert(args),
        None => {
            println!("annox {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Computer-vision annotation exchange.");
            println!();
            println!("Run 'annox --help' for usage information.");
            Ok(())
        }
    }
}

/// Installs the stderr log subscriber. `ANNOX_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "annox=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// JSON shape of `validate --output json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    ok: bool,
    error_count: usize,
    warning_count: usize,
    #[serde(flatten)]
    report: &'a ValidationReport,
}

/// Execute the validate subcommand.
fn run_validate(args: ValidateArgs) -> Result<(), AnnoxError> {
    let opts = validation::ValidateOptions {
        workers: args.workers,
    };
    let report = validation::validate_dataset_file(&args.input, &opts)?;

    match args.output {
        ReportOutput::Json => {
            let json = serde_json::to_string_pretty(&JsonReport {
                ok: report.is_ok(),
                error_count: report.error_count(),
                warning_count: report.warning_count(),
                report: &report,
            })
            .map_err(|e| AnnoxError::Io(e.into()))?;
            println!("{json}");
        }
        ReportOutput::Text => print!("{report}"),
    }

    if report.is_ok() {
        Ok(())
    } else {
        Err(AnnoxError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    }
}

/// Execute the list-formats subcommand.
fn run_list_formats() -> Result<(), AnnoxError> {
    for (name, adapter) in AdapterRegistry::builtin().iter() {
        println!("{name}: {}", adapter.capabilities());
    }
    Ok(())
}

/// Execute the convert subcommand.
fn run_convert(args: ConvertArgs) -> Result<(), AnnoxError> {
    let report = conversion::convert(
        &AdapterRegistry::builtin(),
        &args.from,
        &args.to,
        &args.src,
        &args.dst,
    )?;
    tracing::debug!("conversion report:\n{report}");
    println!("Wrote: {}", args.dst.display());
    Ok(())
}
