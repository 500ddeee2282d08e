//! `set-location`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;

use super::common::{CommandContext, OutputFormat, parse_assignment};
use crate::constants::GROUP_ALL;

#[derive(Args, Debug)]
pub struct SetLocationCommand {
    /// Application environment id
    environment: String,

    /// Orchestrator deploying the environment
    #[arg(long)]
    orchestrator: String,

    /// Placements as GROUP=LOCATION, or a bare LOCATION for every node.
    /// Without any placement, the current placement is removed.
    placements: Vec<String>,
}

impl SetLocationCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let mapping = parse_placements(&self.placements)?;
        let configuration = ctx
            .service
            .set_location_policies(&self.environment, &self.orchestrator, &mapping)
            .await?;

        if ctx.format == OutputFormat::Text {
            if mapping.is_empty() {
                println!("{} placement of '{}'", "Removed".green().bold(), self.environment);
            } else {
                println!("{} '{}'", "Placed".green().bold(), self.environment);
            }
        }
        ctx.show_configuration(&configuration)
    }
}

pub(super) fn parse_placements(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|placement| {
            if placement.contains('=') {
                parse_assignment(placement)
            } else {
                Ok((GROUP_ALL.to_string(), placement.clone()))
            }
        })
        .collect()
}
