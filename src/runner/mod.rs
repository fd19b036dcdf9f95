//! Ad-hoc and playbook execution facade.
//!
//! A [`Runner`] validates its inputs, assembles a one-task play and hands it
//! to an [`Engine`]. Outcomes come back over an event channel and are sorted
//! into a [`ResultSet`]. Engine cleanup runs on every exit path.
//!
//! ```rust,ignore
//! use fleetcall::prelude::*;
//!
//! let runner = Runner::new(Inventory::from_spec("10.0.0.1,10.0.0.2")?)
//!     .module("shell")
//!     .args("uptime");
//! let results = runner.run(&AnsiblePlaybookEngine::new()).await?;
//! ```

pub mod collector;

pub use collector::{ResultCollector, ResultSet};

use std::path::PathBuf;

use tracing::{debug, info};

use crate::engine::{
    event_channel, ConnectionOptions, Engine, ExecutionRequest, ModuleArgs, Play, TaskSpec,
};
use crate::error::{Error, Result};
use crate::inventory::{HostSpec, Inventory, ALL};

/// Modules that do nothing useful without arguments
pub const MODULE_REQUIRE_ARGS: &[&str] = &[
    "command",
    "shell",
    "raw",
    "script",
    "win_command",
    "win_shell",
    "ansible.builtin.command",
    "ansible.builtin.shell",
    "ansible.builtin.raw",
    "ansible.builtin.script",
    "ansible.windows.win_command",
    "ansible.windows.win_shell",
];

/// Fail when `module` needs arguments and `args` carries none
pub fn check_module_args(module: &str, args: &ModuleArgs) -> Result<()> {
    if MODULE_REQUIRE_ARGS.contains(&module) && args.is_empty() {
        return Err(Error::missing_arguments(module));
    }
    Ok(())
}

/// Runs a single module against the hosts a pattern selects
#[derive(Debug, Clone)]
pub struct Runner {
    inventory: Inventory,
    module_name: String,
    module_args: ModuleArgs,
    pattern: String,
    options: ConnectionOptions,
    gather_facts: bool,
}

impl Runner {
    /// A `ping` over every host of `inventory`
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory,
            module_name: "ping".to_string(),
            module_args: ModuleArgs::None,
            pattern: "all".to_string(),
            options: ConnectionOptions::default(),
            gather_facts: false,
        }
    }

    /// Build the inventory from a host specification first
    pub fn from_spec(spec: impl Into<HostSpec>) -> Result<Self> {
        Ok(Self::new(Inventory::from_spec(spec)?))
    }

    pub fn module(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    pub fn args(mut self, args: impl Into<ModuleArgs>) -> Self {
        self.module_args = args.into();
        self
    }

    /// Host pattern to target; a blank pattern means `all`
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.pattern = match pattern.trim() {
            "" => ALL.to_string(),
            trimmed => trimmed.to_string(),
        };
        self
    }

    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn gather_facts(mut self, gather_facts: bool) -> Self {
        self.gather_facts = gather_facts;
        self
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn connection_options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Check the module arguments without running anything
    pub fn validate(&self) -> Result<()> {
        check_module_args(&self.module_name, &self.module_args)
    }

    /// The play this runner would submit
    pub fn play(&self) -> Play {
        Play::adhoc(
            self.pattern.clone(),
            TaskSpec::new(self.module_name.clone(), self.module_args.clone()),
        )
        .with_gather_facts(self.gather_facts)
    }

    /// Run the module and collect per-host results
    pub async fn run(&self, engine: &dyn Engine) -> Result<ResultSet> {
        let outcome = self.run_inner(engine).await;
        engine.cleanup().await;
        outcome
    }

    async fn run_inner(&self, engine: &dyn Engine) -> Result<ResultSet> {
        if self.inventory.is_empty() {
            return Err(Error::EmptyInventory);
        }

        let hosts = self.inventory.list_hosts(&self.pattern)?;
        if hosts.is_empty() {
            return Err(Error::pattern_match(&self.pattern));
        }

        self.validate()?;

        info!(
            engine = engine.name(),
            module = %self.module_name,
            pattern = %self.pattern,
            hosts = hosts.len(),
            "running ad-hoc module"
        );

        let request = ExecutionRequest::adhoc(self.play(), self.options.clone());
        let results = execute_and_collect(engine, &request, &self.inventory).await?;

        info!(
            contacted = results.contacted.len(),
            dark = results.dark.len(),
            "ad-hoc run finished"
        );
        Ok(results)
    }
}

/// Runs an existing playbook file against an inventory
#[derive(Debug, Clone)]
pub struct PlaybookRunner {
    inventory: Inventory,
    playbook: PathBuf,
    options: ConnectionOptions,
}

impl PlaybookRunner {
    pub fn new(inventory: Inventory, playbook: impl Into<PathBuf>) -> Self {
        Self {
            inventory,
            playbook: playbook.into(),
            options: ConnectionOptions::default(),
        }
    }

    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn playbook(&self) -> &PathBuf {
        &self.playbook
    }

    /// Run the playbook and collect per-host results
    pub async fn run(&self, engine: &dyn Engine) -> Result<ResultSet> {
        let outcome = self.run_inner(engine).await;
        engine.cleanup().await;
        outcome
    }

    async fn run_inner(&self, engine: &dyn Engine) -> Result<ResultSet> {
        if self.inventory.is_empty() {
            return Err(Error::EmptyInventory);
        }
        if !self.playbook.is_file() {
            return Err(Error::PlaybookNotFound(self.playbook.clone()));
        }

        info!(
            engine = engine.name(),
            playbook = %self.playbook.display(),
            hosts = self.inventory.host_count(),
            "running playbook"
        );

        let request = ExecutionRequest::playbook(self.playbook.clone(), self.options.clone());
        execute_and_collect(engine, &request, &self.inventory).await
    }
}

async fn execute_and_collect(
    engine: &dyn Engine,
    request: &ExecutionRequest,
    inventory: &Inventory,
) -> Result<ResultSet> {
    let (events, mut rx) = event_channel();
    engine.execute(request, inventory, events).await?;

    let mut collector = ResultCollector::new();
    collector.drain(&mut rx).await;
    let results = collector.finish();
    debug!(hosts = results.host_count(), "collected engine results");
    Ok(results)
}
