//! Playbook command - run an existing playbook

use super::{CommandContext, ConnectionArgs};
use anyhow::Result;
use clap::Parser;
use fleetcall::runner::PlaybookRunner;
use std::path::PathBuf;

/// Arguments for playbook command
#[derive(Parser, Debug, Clone)]
pub struct PlaybookArgs {
    /// Path to the playbook file
    #[arg(required = true)]
    pub playbook: PathBuf,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl PlaybookArgs {
    /// Execute the playbook command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let options = self.connection.resolve(&ctx.config);
        let runner = PlaybookRunner::new(ctx.load_inventory()?, &self.playbook).options(options);

        let engine = ctx.engine();
        let results = runner.run(&engine).await?;
        Ok(ctx.report(&results))
    }
}
