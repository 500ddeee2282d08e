//! `set-property` and `substitute`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, OutputFormat, parse_value, require_node, unknown};
use crate::core::EntityKind;

#[derive(Args, Debug)]
pub struct SetPropertyCommand {
    /// Application environment id
    environment: String,

    /// Substituted node
    node: String,

    /// Property name
    property: String,

    /// New value; omit to reset to the property's default
    value: Option<String>,

    /// Set a property of this capability instead of the node
    #[arg(long)]
    capability: Option<String>,

    /// Parse the value as JSON (mappings, lists, null)
    #[arg(long)]
    json: bool,
}

impl SetPropertyCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let value = parse_value(self.value.as_deref(), self.json)?;
        let mut derived =
            ctx.service.get_deployment_configuration(&self.environment).await?.deployment_topology;
        require_node(&derived, &self.node)?;

        let target = match &self.capability {
            Some(capability) => {
                ctx.service
                    .update_substitution_capability_property(
                        &mut derived,
                        &self.node,
                        capability,
                        &self.property,
                        value,
                    )
                    .await?;
                format!("{}.{}.{}", self.node, capability, self.property)
            }
            None => {
                ctx.service
                    .update_substitution_property(&mut derived, &self.node, &self.property, value)
                    .await?;
                format!("{}.{}", self.node, self.property)
            }
        };

        if ctx.format == OutputFormat::Text {
            println!("{} {}", "Updated".green().bold(), target);
        }
        ctx.show_topology(&derived)
    }
}

#[derive(Args, Debug)]
pub struct SubstituteCommand {
    /// Application environment id
    environment: String,

    /// Node to bind
    node: String,

    /// Location resource template to bind the node to
    resource: String,
}

impl SubstituteCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let configuration = ctx.service.get_deployment_configuration(&self.environment).await?;
        let available = &configuration.availability.available_substitutions;

        let Some(candidates) = available.get(&self.node) else {
            return Err(unknown(EntityKind::Node, &self.node, available.keys().map(String::as_str)));
        };
        if !candidates.contains(&self.resource) {
            return Err(unknown(
                EntityKind::ResourceTemplate,
                &self.resource,
                candidates.iter().map(String::as_str),
            ));
        }

        let mut derived = configuration.deployment_topology;
        ctx.service.update_substitution(&mut derived, &self.node, &self.resource).await?;

        if ctx.format == OutputFormat::Text {
            println!("{} {} by {}", "Substituted".green().bold(), self.node, self.resource);
        }
        ctx.show_topology(&derived)
    }
}
