//! Adhoc command - run a single module against a host pattern

use super::{CommandContext, ConnectionArgs};
use anyhow::Result;
use clap::Parser;
use fleetcall::runner::Runner;
use tracing::debug;

/// Arguments for adhoc command
#[derive(Parser, Debug, Clone)]
pub struct AdhocArgs {
    /// Host pattern to target (defaults to the configured pattern)
    pub pattern: Option<String>,

    /// Module to run (defaults to the configured module)
    #[arg(short = 'm', long = "module-name")]
    pub module_name: Option<String>,

    /// Module arguments
    #[arg(short = 'a', long = "args")]
    pub args: Option<String>,

    /// Gather facts before running the module
    #[arg(long)]
    pub gather_facts: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl AdhocArgs {
    /// Execute the adhoc command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let defaults = &ctx.config.defaults;
        let pattern = self.pattern.clone().unwrap_or_else(|| defaults.pattern.clone());
        let module = self
            .module_name
            .clone()
            .unwrap_or_else(|| defaults.module_name.clone());
        let options = self.connection.resolve(&ctx.config);
        let gather_facts = self.gather_facts || defaults.gather_facts.unwrap_or(false);

        let runner = Runner::new(ctx.load_inventory()?)
            .module(module)
            .args(self.args.clone())
            .pattern(pattern)
            .options(options)
            .gather_facts(gather_facts);

        // Fail on missing arguments before the engine is even located
        runner.validate()?;
        debug!(play = ?runner.play(), "submitting ad-hoc play");

        let engine = ctx.engine();
        let results = runner.run(&engine).await?;
        Ok(ctx.report(&results))
    }
}
