//! `sync` and `finalize`.

use anyhow::Result;
use clap::Args;

use super::common::{CommandContext, print_json};

#[derive(Args, Debug)]
pub struct SyncCommand {
    /// Application environment id
    environment: String,
}

impl SyncCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let configuration = ctx.service.get_deployment_configuration(&self.environment).await?;
        ctx.show_configuration(&configuration)
    }
}

#[derive(Args, Debug)]
pub struct FinalizeCommand {
    /// Application environment id
    environment: String,
}

impl FinalizeCommand {
    /// Always prints JSON: the output is meant for deployment planning tools.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let configuration = ctx.service.get_deployment_configuration(&self.environment).await?;
        let finalized = ctx.service.finalize_for_deployment(&configuration.deployment_topology);
        print_json(&finalized)
    }
}
