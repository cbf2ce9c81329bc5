//! Binary entry point for the protomerge CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Merge every *.json observation document in obs/ over the hierarchy
//! protomerge merge --classes hierarchy.json --observations obs/ --out-dir out/
//!
//! # Effective vtable of a class, from the exported documents
//! protomerge show IOService --classes out/classes.json --prototypes out/prototypes.json
//! ```
//!
//! Results and errors are printed as JSON on stdout; logs go to stderr.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use protomerge::cli::{run_merge, run_show};
use protomerge_core::config::{CliOverrides, MergeConfig};
use protomerge_core::error::{MergeError, OutputErrorCode};
use protomerge_core::output::{
    emit_response, emit_response_compact, ErrorResponse, ShowResponse, VtableEncoding,
    CLASSES_FILE, PROTOTYPES_FILE,
};

// ============================================================================
// CLI Structure
// ============================================================================

/// Merge per-binary vtable observations into a shared prototype table.
#[derive(Parser, Debug)]
#[command(
    name = "protomerge",
    version,
    about = "Merge C++ vtable observations across a class hierarchy"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output (overridden by RUST_LOG).
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge observations and write classes.json and prototypes.json.
    Merge {
        /// Class hierarchy document.
        #[arg(long)]
        classes: PathBuf,

        /// Directory of per-binary observation documents.
        #[arg(long)]
        observations: PathBuf,

        /// Output directory [env: PROTOMERGE_OUT_DIR, default: .].
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Vtable entry encoding: objects or compact [env: PROTOMERGE_VTABLE_FORMAT].
        #[arg(long)]
        vtable_format: Option<VtableEncoding>,

        /// File-name glob selecting observation documents [env: PROTOMERGE_GLOB, default: *.json].
        #[arg(long)]
        glob: Option<String>,

        /// Keep `void` return types of get* methods.
        #[arg(long)]
        no_fix_getters: bool,

        /// Write single-line JSON documents.
        #[arg(long)]
        compact_json: bool,

        /// Also write the report to report.json in the output directory.
        #[arg(long)]
        report: bool,
    },

    /// Print the effective vtable of a class.
    Show {
        /// Class name.
        class: String,

        /// Exported class document.
        #[arg(long, default_value = CLASSES_FILE)]
        classes: PathBuf,

        /// Exported prototype document.
        #[arg(long, default_value = PROTOTYPES_FILE)]
        prototypes: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_json);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like every other result.
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, json: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), MergeError> {
    match cli.command {
        Command::Merge {
            classes,
            observations,
            out_dir,
            vtable_format,
            glob,
            no_fix_getters,
            compact_json,
            report,
        } => {
            let overrides = CliOverrides {
                out_dir,
                vtable_encoding: vtable_format,
                observation_glob: glob,
                fix_getters: no_fix_getters.then_some(false),
                pretty: compact_json.then_some(false),
            };
            execute_merge(&overrides, &classes, &observations, report)
        }
        Command::Show {
            class,
            classes,
            prototypes,
        } => execute_show(&classes, &prototypes, &class),
    }
}

// ============================================================================
// Command Executors
// ============================================================================

/// Execute merge command.
fn execute_merge(
    overrides: &CliOverrides,
    classes: &Path,
    observations: &Path,
    write_report: bool,
) -> Result<(), MergeError> {
    let config = MergeConfig::resolve(overrides)?;
    let report = run_merge(&config, classes, observations, write_report)?;

    let mut stdout = io::stdout();
    let emitted = if config.pretty.value {
        emit_response(&report, &mut stdout)
    } else {
        emit_response_compact(&report, &mut stdout)
    };
    emitted.map_err(|e| MergeError::internal(e.to_string()))?;
    let _ = stdout.flush();
    Ok(())
}

/// Execute show command.
fn execute_show(
    classes: &Path,
    prototypes: &Path,
    class: &str,
) -> Result<(), MergeError> {
    let vtable = run_show(classes, prototypes, class)?;
    let response = ShowResponse::new(vtable);
    emit_response(&response, &mut io::stdout()).map_err(|e| MergeError::internal(e.to_string()))?;
    let _ = io::stdout().flush();
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
