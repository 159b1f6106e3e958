//! `batcvd`: daily BAT/CVD settlement reconciliation.

mod exit_codes;
mod stages;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use batcvd_io::IoError;
use batcvd_recon::{ReconConfig, ReconError};

use exit_codes::*;

#[derive(Parser)]
#[command(name = "batcvd")]
#[command(about = "BAT/CVD settlement reconciliation: cross-match, state enrichment, day-over-day carryover")]
#[command(version)]
struct Cli {
    /// TOML file overriding column names, sheet names and date formats
    #[arg(long, global = true, env = "BATCVD_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage 1: split a raw upload into BAT/CVD, cross-link and remark them
    #[command(after_help = "\
Examples:
  batcvd cross-match raw_2026-05-01.xlsx -o processed.xlsx
  batcvd cross-match upload.csv -o processed.xlsx --json
  batcvd cross-match raw.xlsx --sheet Sheet2 -o processed.xlsx")]
    CrossMatch {
        /// Raw upload (xlsx/xls/xlsm/ods or csv)
        raw: PathBuf,

        /// Output workbook (sheets: CVD, BAT, Pending Refunds)
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Sheet to read from a workbook input (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Print row counts as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Stage 2: attach gateway state to BAT rows and build the settlement summary
    #[command(after_help = "\
Examples:
  batcvd enrich processed.xlsx gateway_states.csv -o enriched.xlsx
  batcvd enrich processed.xlsx states.xlsx --feed-sheet export -o enriched.xlsx --json")]
    Enrich {
        /// Stage 1 output workbook (BAT and CVD sheets)
        processed: PathBuf,

        /// Gateway state feed (csv or workbook) with transaction_uid and state
        feed: PathBuf,

        /// Output workbook (sheets: BAT, CVD, summary_output)
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Sheet to read from a workbook feed (default: first sheet)
        #[arg(long)]
        feed_sheet: Option<String>,

        /// Print the settlement summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Stage 3: promote yesterday's pending items that today's data resolved
    #[command(after_help = "\
Examples:
  batcvd carryover enriched_2026-05-01.xlsx enriched_2026-05-02.xlsx -o carried.xlsx
  batcvd carryover yesterday.xlsx today.xlsx -o carried.xlsx --json")]
    Carryover {
        /// Yesterday's processed workbook
        yesterday: PathBuf,

        /// Today's processed workbook
        today: PathBuf,

        /// Output workbook (sheets: BAT, CVD, summary_output)
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Print the settlement summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    #[command(after_help = "\
Examples:
  batcvd config > batcvd.toml
  batcvd config --config batcvd.toml")]
    Config,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let message = err.to_string();
        match err {
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => Self::config(message),
            ReconError::MissingColumn { .. } => Self {
                code: EXIT_VALIDATION,
                message,
                hint: Some("column names can be remapped under [columns] in --config".to_string()),
            },
            ReconError::MissingSheet { .. } => Self {
                code: EXIT_VALIDATION,
                message,
                hint: Some("sheet names can be remapped under [sheets] in --config".to_string()),
            },
            ReconError::Io(_) => Self::io(message),
        }
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::MissingSheet { path, sheet } => ReconError::MissingSheet { source: path, sheet }.into(),
            IoError::EmptySheet { .. } => Self { code: EXIT_VALIDATION, message: err.to_string(), hint: None },
            IoError::Read { .. } | IoError::Write { .. } => Self::io(err.to_string()),
        }
    }
}

// ============================================================================
// Entry
// ============================================================================

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Defaults, or the given TOML file layered over them.
fn load_config(path: Option<&PathBuf>) -> Result<ReconConfig, CliError> {
    let Some(path) = path else {
        return Ok(ReconConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| ReconError::Io(format!("cannot read config {}: {e}", path.display())))?;
    Ok(ReconConfig::from_toml(&text)?)
}

fn cmd_config(config: &ReconConfig) -> Result<(), CliError> {
    let text = config.to_toml().map_err(CliError::from)?;
    print!("{text}");
    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::CrossMatch { raw, output, sheet, json } => {
            stages::cmd_cross_match(&config, &raw, sheet.as_deref(), &output, json)
        }
        Commands::Enrich { processed, feed, output, feed_sheet, json } => {
            stages::cmd_enrich(&config, &processed, &feed, feed_sheet.as_deref(), &output, json)
        }
        Commands::Carryover { yesterday, today, output, json } => {
            stages::cmd_carryover(&config, &yesterday, &today, &output, json)
        }
        Commands::Config => cmd_config(&config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
