//! CLI module for Fleetcall
//!
//! Argument parsing and subcommand dispatch for the `fleetcall` binary.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fleetcall - run ad-hoc modules and playbooks over an Ansible-compatible engine
#[derive(Parser, Debug, Clone)]
#[command(name = "fleetcall")]
#[command(author = "Fleetcall Contributors")]
#[command(version)]
#[command(about = "Run ad-hoc modules and playbooks against quickly described inventories", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Inventory source: inline hosts ("h1,h2" or JSON), a spec file, or a script
    #[arg(short = 'i', long, global = true, env = "FLEETCALL_INVENTORY")]
    pub inventory: Option<String>,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a single module against a host pattern
    Adhoc(commands::adhoc::AdhocArgs),

    /// Run an existing playbook
    Playbook(commands::playbook::PlaybookArgs),

    /// List hosts matching a pattern
    #[command(name = "list-hosts")]
    ListHosts(commands::inventory::ListHostsArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
