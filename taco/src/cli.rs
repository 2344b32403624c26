//! Command-line arguments for the batch runner.

use clap::Parser;
use std::path::PathBuf;
use taco::input::DEFAULT_SUFFIX;
use taco::ledger::DEFAULT_LEDGER_FILE;
use taco::settings::DEFAULT_SETTINGS_FILE;

/// Runs the TACO pipeline over every raw light curve in a directory.
///
/// Items already recorded in the ledger are skipped, so an interrupted run
/// can simply be started again.
#[derive(Parser, Debug)]
#[command(name = "taco", version, about = "Resumable batch runner for the TACO pipeline")]
pub struct Args {
    /// Directory containing the raw time-series files
    #[arg(short = 'i', long, value_name = "DIR", default_value = ".")]
    pub input: PathBuf,

    /// Directory receiving one sub-directory of artifacts per item
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Pipeline settings document
    #[arg(short = 's', long, value_name = "FILE", default_value = DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,

    /// Ledger of finished items
    #[arg(short = 'l', long, value_name = "FILE", default_value = DEFAULT_LEDGER_FILE)]
    pub ledger: PathBuf,

    /// Suffix of raw input files, without the dot
    #[arg(long, value_name = "EXT", default_value = DEFAULT_SUFFIX)]
    pub suffix: String,

    /// Increase log verbosity (-v debug, -vv trace and settings dump)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Abort the run on the first item error
    #[arg(long)]
    pub fail_fast: bool,
}

impl Args {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
