//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::listing::{decode_mcu, FilterState};

/// Revision variants command arguments.
#[derive(Debug, Args)]
pub struct VariantsCommand {
    /// Controller record (YAML)
    pub file: PathBuf,

    /// Print the merged specification of each variant as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Catalog validation command arguments.
#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Content directory (defaults to `catalog.content_dir`)
    pub dir: Option<PathBuf>,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Search export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Content directory (defaults to `catalog.content_dir`)
    pub content_dir: Option<PathBuf>,

    /// Output file (defaults to `search.index_path`)
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Search command arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Free-text query
    pub query: Option<String>,

    /// MCU family (e.g. H7 or STM32H7)
    #[arg(long)]
    pub mcu: Option<String>,

    /// Mounting pattern (e.g. 30.5x30.5)
    #[arg(long)]
    pub mounting: Option<String>,

    /// UART bucket (0-4, 5-6, 7-8, 9-10, 11+)
    #[arg(long)]
    pub uarts: Option<String>,

    /// Lifecycle (e.g. active, end-of-life)
    #[arg(long)]
    pub lifecycle: Option<String>,

    /// Only boards with a CAN bus
    #[arg(long)]
    pub can: bool,

    /// Only boards with a MicroSD slot
    #[arg(long)]
    pub sd: bool,

    /// Firmware statuses, any of which may match
    #[arg(long, value_delimiter = ',')]
    pub firmware: Vec<String>,

    /// Page to show
    #[arg(short, long)]
    pub page: Option<usize>,

    /// Start from a listing URL or query string (`?q=..&mcu=..`)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Print facet options with their counts
    #[arg(long)]
    pub facets: bool,

    /// Read queries from stdin, one per line, searching as they arrive
    #[arg(short, long, conflicts_with = "facets")]
    pub interactive: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl SearchCommand {
    /// Filter state from `--url`, overridden by explicit flags.
    #[must_use]
    pub fn filter_state(&self) -> FilterState {
        let mut state = self
            .url
            .as_deref()
            .map(|url| FilterState::from_query(url.split_once('?').map_or(url, |(_, q)| q)))
            .unwrap_or_default();

        if let Some(query) = &self.query {
            state.search_text.clone_from(query);
        }
        if let Some(mcu) = &self.mcu {
            state.mcu = Some(decode_mcu(mcu));
        }
        for (flag, slot) in [
            (&self.mounting, &mut state.mounting),
            (&self.uarts, &mut state.uarts),
            (&self.lifecycle, &mut state.lifecycle),
        ] {
            if flag.is_some() {
                slot.clone_from(flag);
            }
        }
        state.can |= self.can;
        state.sd |= self.sd;
        for status in &self.firmware {
            let status = status.trim();
            if !status.is_empty() && !state.firmware.iter().any(|f| f == status) {
                state.firmware.push(status.to_string());
            }
        }
        if let Some(page) = self.page {
            state.page = page.max(1);
        }

        state
    }
}

/// Compare list command arguments.
#[derive(Debug, Args)]
pub struct CompareCommand {
    /// Category (e.g. controller, transmitter)
    pub category: String,

    /// What to do with the list
    #[command(subcommand)]
    pub action: CompareAction,
}

/// Compare list actions.
#[derive(Debug, Subcommand)]
pub enum CompareAction {
    /// Print the list
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add an id
    Add {
        /// Record id
        id: String,
    },

    /// Remove an id
    Remove {
        /// Record id
        id: String,
    },

    /// Add the id if absent, remove it if present
    Toggle {
        /// Record id
        id: String,
    },

    /// Empty the list
    Clear,

    /// Drop ids the catalog no longer has
    Prune {
        /// Content directory (defaults to `catalog.content_dir`)
        #[arg(long)]
        content_dir: Option<PathBuf>,
    },

    /// Print changes made by other processes until interrupted
    Watch,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
