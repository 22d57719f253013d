//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HashCommand, HistoryCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Declarative literature-search pipelines
#[derive(Debug, Parser, Clone)]
#[command(name = "litpipe")]
#[command(version)]
#[command(about = "Validate, run and track literature-search pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Validate (and auto-fix) a pipeline document
    Validate(ValidateCommand),

    /// Print the content hash of a validated pipeline
    Hash(HashCommand),

    /// Run a pipeline against fixture providers
    Run(RunCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
