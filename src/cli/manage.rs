//! `list` and `delete`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, OutputFormat, print_json};

#[derive(Args, Debug)]
pub struct ListCommand {
    /// Source topology id
    topology: String,
}

impl ListCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let topologies = ctx.service.list_by_topology_id(&self.topology).await?;

        if ctx.format == OutputFormat::Json {
            return print_json(&topologies);
        }
        if topologies.is_empty() {
            println!("No deployment topologies derived from '{}'", self.topology);
            return Ok(());
        }
        for derived in &topologies {
            let locations: Vec<_> = derived.location_ids().into_values().collect();
            println!(
                "{}  env={} version={} revision={} locations=[{}]",
                derived.id.cyan(),
                derived.environment_id,
                derived.version_id,
                derived.revision,
                locations.join(", ")
            );
        }
        println!("{}: {}", "Total".green().bold(), topologies.len());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Application environment id
    environment: String,
}

impl DeleteCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let removed = ctx.service.delete_by_environment_id(&self.environment).await?;
        match ctx.format {
            OutputFormat::Json => print_json(&serde_json::json!({ "removed": removed })),
            OutputFormat::Text => {
                println!(
                    "{} {} deployment topologies of '{}'",
                    "Deleted".green().bold(),
                    removed,
                    self.environment
                );
                Ok(())
            }
        }
    }
}
