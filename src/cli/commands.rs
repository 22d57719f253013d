//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Validate a pipeline document
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML or JSON file
    pub file: PathBuf,

    /// Output the full validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Print a pipeline's content hash
#[derive(Debug, Args, Clone)]
pub struct HashCommand {
    /// Path to pipeline YAML or JSON file
    pub file: PathBuf,
}

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML or JSON file
    pub file: PathBuf,

    /// JSON fixture file defining the source providers
    #[arg(long)]
    pub fixtures: PathBuf,

    /// Whole-run time budget in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Output the run as JSON
    #[arg(long)]
    pub json: bool,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// History database (defaults to the user data directory)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// History database (defaults to the user data directory)
    #[arg(long)]
    pub db: Option<PathBuf>,
}
