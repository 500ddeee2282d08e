//! `set-input`.

use anyhow::Result;
use clap::Args;
use std::collections::BTreeMap;

use super::common::{CommandContext, parse_assignment, parse_value, unknown};
use crate::core::EntityKind;

#[derive(Args, Debug)]
pub struct SetInputCommand {
    /// Application environment id
    environment: String,

    /// Input values as NAME=VALUE
    values: Vec<String>,

    /// Inputs to reset to their default
    #[arg(long = "unset", value_name = "NAME")]
    unset: Vec<String>,

    /// Parse values as JSON
    #[arg(long)]
    json: bool,
}

impl SetInputCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let mut values = BTreeMap::new();
        for raw in &self.values {
            let (name, value) = parse_assignment(raw)?;
            values.insert(name, parse_value(Some(&value), self.json)?);
        }
        for name in self.unset {
            values.insert(name, None);
        }

        let current = ctx.service.get_deployment_configuration(&self.environment).await?;
        let declared = &current.deployment_topology.template.inputs;
        if let Some(name) = values.keys().find(|name| !declared.contains_key(*name)) {
            return Err(unknown(EntityKind::Input, name, declared.keys().map(String::as_str)));
        }

        let configuration = ctx.service.set_input_properties(&self.environment, values).await?;
        ctx.show_configuration(&configuration)
    }
}
