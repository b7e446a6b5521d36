//! Command-line interface for fcbase.
//!
//! This module provides the CLI structure for the `fcbase` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CompareAction, CompareCommand, ConfigCommand, ExportCommand, OutputFormat, SearchCommand,
    ValidateCommand, VariantsCommand,
};

/// fcbase - Flight controller catalog tools
///
/// Expands hardware revisions into variants, validates catalog records,
/// exports and searches the controller index, and manages compare lists.
#[derive(Debug, Parser)]
#[command(name = "fcbase")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the base and revision variants of a controller record
    Variants(VariantsCommand),

    /// Validate catalog records
    Validate(ValidateCommand),

    /// Build the flattened search export
    Export(ExportCommand),

    /// Search controllers with text and facet filters
    Search(SearchCommand),

    /// Manage compare lists
    Compare(CompareCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}
