//! Subcommands module for Fleetcall CLI

pub mod adhoc;
pub mod inventory;
pub mod playbook;

use crate::cli::output::OutputFormatter;
use anyhow::{Context, Result};
use clap::Args;
use fleetcall::config::Config;
use fleetcall::engine::{AnsiblePlaybookEngine, ConnectionOptions};
use fleetcall::inventory::Inventory;
use fleetcall::runner::ResultSet;
use std::path::PathBuf;

/// Connection password for the managed hosts
pub const CONN_PASS_ENV: &str = "FLEETCALL_CONN_PASS";
/// Password for privilege escalation
pub const BECOME_PASS_ENV: &str = "FLEETCALL_BECOME_PASS";

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Inventory source given on the command line
    pub inventory_source: Option<String>,
    /// Verbosity level
    pub verbosity: u8,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity());

        Self {
            config,
            output,
            inventory_source: cli.inventory.clone(),
            verbosity: cli.verbosity(),
        }
    }

    /// Get the effective inventory source
    pub fn inventory(&self) -> Option<&str> {
        self.inventory_source
            .as_deref()
            .or(self.config.defaults.inventory.as_deref())
    }

    /// Build the inventory from the effective source
    pub fn load_inventory(&self) -> Result<Inventory> {
        let source = self
            .inventory()
            .context("No inventory specified. Use -i to give hosts, a spec file, or a script.")?;
        let inventory = Inventory::load(source)
            .map_err(fleetcall::Error::from)
            .with_context(|| format!("Failed to load inventory from '{}'", source))?;
        Ok(inventory)
    }

    /// The engine configured for this invocation
    pub fn engine(&self) -> AnsiblePlaybookEngine {
        match &self.config.engine.ansible_playbook {
            Some(path) => AnsiblePlaybookEngine::new().with_binary(path),
            None => AnsiblePlaybookEngine::new(),
        }
    }

    /// Print results and map them to an exit code
    pub fn report(&self, results: &ResultSet) -> i32 {
        self.output.results(results);
        if results.all_contacted() {
            0
        } else {
            2
        }
    }
}

/// Connection flags shared by `adhoc` and `playbook`
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Connect as this user
    #[arg(short = 'u', long = "user")]
    pub remote_user: Option<String>,

    /// Private key file for authentication
    #[arg(long = "private-key")]
    pub private_key: Option<PathBuf>,

    /// Connection type to use
    #[arg(short = 'C', long = "connection")]
    pub connection: Option<String>,

    /// Connection timeout in seconds
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,

    /// Number of parallel processes
    #[arg(short = 'f', long)]
    pub forks: Option<usize>,

    /// Run operations with privilege escalation
    #[arg(short = 'b', long = "become")]
    pub r#become: bool,

    /// Privilege escalation method
    #[arg(long = "become-method")]
    pub become_method: Option<String>,

    /// Privilege escalation user
    #[arg(long = "become-user")]
    pub become_user: Option<String>,

    /// Don't make any changes; predict what would change
    #[arg(long)]
    pub check: bool,

    /// Extra variables (key=value or @file)
    #[arg(short = 'e', long = "extra-vars", action = clap::ArgAction::Append)]
    pub extra_vars: Vec<String>,
}

impl ConnectionArgs {
    /// Overlay these flags on the configured connection options
    pub fn apply(&self, mut options: ConnectionOptions) -> ConnectionOptions {
        if let Some(user) = &self.remote_user {
            options.remote_user = user.clone();
        }
        if let Some(key) = &self.private_key {
            options.private_key_file = Some(key.clone());
        }
        if let Some(connection) = &self.connection {
            options.connection = connection.clone();
        }
        if let Some(timeout) = self.timeout {
            options.timeout = timeout;
        }
        if let Some(forks) = self.forks {
            options.forks = forks;
        }
        if self.r#become {
            options.become_ = true;
        }
        if let Some(method) = &self.become_method {
            options.become_method = method.clone();
        }
        if let Some(user) = &self.become_user {
            options.become_user = user.clone();
        }
        options.check = options.check || self.check;
        options.extra_vars.extend(self.extra_vars.iter().cloned());
        options.conn_pass = std::env::var(CONN_PASS_ENV).ok().or(options.conn_pass);
        options.become_pass = std::env::var(BECOME_PASS_ENV).ok().or(options.become_pass);
        options
    }

    /// Resolve connection options from config and flags
    pub fn resolve(&self, config: &Config) -> ConnectionOptions {
        self.apply(config.connection_options())
    }
}
