//! Shared plumbing of the CLI commands.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::sync::Arc;

use super::CliConfig;
use crate::config::EngineConfig;
use crate::core::{EntityKind, ErrorContext, TopologyError, closest_match};
use crate::deployment::{DeploymentConfiguration, DeploymentTopology, DeploymentTopologyService};
use crate::models::PropertyValue;
use crate::store::FileStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub struct CommandContext {
    pub service: DeploymentTopologyService<FileStore>,
    pub format: OutputFormat,
}

impl CommandContext {
    pub async fn open(config: &CliConfig) -> Result<Self> {
        let engine_config = EngineConfig::load_with_optional(config.config_path.clone()).await?;
        let store_path = match &config.store_path {
            Some(path) => path.clone(),
            None => engine_config.resolved_store_path()?,
        };
        tracing::debug!("Using store at {}", store_path.display());

        let store = Arc::new(FileStore::new(store_path));
        Ok(Self {
            service: DeploymentTopologyService::from_config(store, &engine_config),
            format: config.format,
        })
    }

    /// Print a configuration as JSON or as a summary.
    pub fn show_configuration(&self, configuration: &DeploymentConfiguration) -> Result<()> {
        match self.format {
            OutputFormat::Json => print_json(configuration),
            OutputFormat::Text => {
                print_summary(configuration);
                Ok(())
            }
        }
    }

    /// Print a deployment topology as JSON or as a summary without availability.
    pub fn show_topology(&self, derived: &DeploymentTopology) -> Result<()> {
        match self.format {
            OutputFormat::Json => print_json(derived),
            OutputFormat::Text => {
                print_header(derived);
                print_bindings(derived, None);
                Ok(())
            }
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON output")?;
    println!("{rendered}");
    Ok(())
}

fn print_header(derived: &DeploymentTopology) {
    println!(
        "{} {} {}",
        "Deployment topology".bold(),
        derived.id.cyan(),
        format!("(revision {})", derived.revision).dimmed()
    );
    let synced = derived
        .last_sync_timestamp
        .map_or_else(|| "never".to_string(), |ts| ts.to_rfc3339());
    println!("  {:<14}{} (synced {})", "Topology:", derived.initial_topology_id, synced);

    let locations = derived.location_ids();
    if locations.is_empty() {
        println!("  {:<14}{}", "Locations:", "none".yellow());
    } else {
        for (group, location) in locations {
            println!("  {:<14}{} -> {}", "Location:", group, location.green());
        }
    }
    if let Some(orchestrator) = &derived.orchestrator_id {
        println!("  {:<14}{}", "Orchestrator:", orchestrator);
    }
}

fn print_bindings(derived: &DeploymentTopology, configuration: Option<&DeploymentConfiguration>) {
    if derived.substituted_nodes.is_empty() {
        println!("  {:<14}{}", "Substitutions:", "none".yellow());
        return;
    }
    println!("  Substitutions:");
    for (node, resource) in &derived.substituted_nodes {
        let candidates = configuration
            .and_then(|c| c.availability.available_substitutions.get(node))
            .map(|ids| ids.iter().map(String::as_str).collect::<Vec<_>>().join(", "));
        match candidates {
            Some(candidates) => {
                println!("    {} -> {} (candidates: {})", node, resource.green(), candidates)
            }
            None => println!("    {} -> {}", node, resource.green()),
        }
    }
}

fn print_summary(configuration: &DeploymentConfiguration) {
    let derived = &configuration.deployment_topology;
    print_header(derived);
    print_bindings(derived, Some(configuration));

    let unbound: Vec<_> = configuration
        .availability
        .available_substitutions
        .keys()
        .filter(|node| !derived.substituted_nodes.contains_key(*node))
        .collect();
    if !unbound.is_empty() {
        println!("  {} {:?}", "Unbound:".yellow(), unbound);
    }
}

/// Parse a property value given on the command line.
///
/// Plain values are strings. With `json`, the value is parsed as JSON so that
/// mappings, lists and `null` can be passed.
pub fn parse_value(raw: Option<&str>, json: bool) -> Result<Option<PropertyValue>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if !json {
        return Ok(Some(PropertyValue::scalar(raw)));
    }
    let value: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("'{raw}' is not valid JSON"))?;
    Ok(PropertyValue::from_json(value)?)
}

/// Split `KEY=VALUE`.
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| TopologyError::InvalidArgument {
        reason: format!("'{raw}' is not of the form KEY=VALUE"),
    })?;
    if key.trim().is_empty() {
        return Err(TopologyError::InvalidArgument {
            reason: format!("'{raw}' has an empty key"),
        }
        .into());
    }
    Ok((key.trim().to_string(), value.to_string()))
}

/// A not-found error with a "did you mean" hint drawn from `known`.
pub fn unknown<'a>(
    kind: EntityKind,
    id: &str,
    known: impl IntoIterator<Item = &'a str>,
) -> anyhow::Error {
    let context = ErrorContext::new(TopologyError::not_found(kind, id));
    match closest_match(id, known) {
        Some(candidate) => context.with_suggestion(format!("Did you mean '{candidate}'?")).into(),
        None => context.into(),
    }
}

/// Fail unless the deployment topology has a node called `node_id`.
pub fn require_node(derived: &DeploymentTopology, node_id: &str) -> Result<()> {
    if derived.template.node_templates.contains_key(node_id) {
        return Ok(());
    }
    Err(unknown(
        EntityKind::Node,
        node_id,
        derived.template.node_templates.keys().map(String::as_str),
    ))
}
