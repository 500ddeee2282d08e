//! In-memory regeneration of a deployment topology from its source.
//!
//! [`regenerate`] performs every step of a rebuild except the save. It takes
//! the deployment topology by value and returns the rebuilt one, so a failure
//! at any step leaves the caller's copy (and the stored document) untouched.
//!
//! Order of the steps:
//!
//! 1. stamp the source and location watermarks
//! 2. capture the previous bindings
//! 3. replace the embedded template with the source's
//! 4. composition
//! 5. input properties, `get_input` resolution, input artifacts, provider properties
//! 6. substitution, keeping previous bindings that are still candidates

use std::collections::BTreeMap;
use tracing::debug;

use super::inputs::apply_input_steps;
use super::substitution::{SubstitutionInputs, process_substitutions, resolve_available};
use super::{DeploymentTopology, SubstitutionSnapshot};
use crate::collaborators::{CompositionProcessor, SubstitutionMatcher};
use crate::models::{Location, LocationResources, NodeType, Orchestrator, Topology};

/// Everything a regeneration reads.
pub struct GenerationContext<'a> {
    pub source: &'a Topology,

    /// Placement locations keyed by group name.
    pub locations: &'a BTreeMap<String, Location>,

    /// Resources of each placement location, keyed by location id.
    pub resources: &'a BTreeMap<String, LocationResources>,

    /// Types of the source topology's nodes.
    pub node_types: &'a BTreeMap<String, NodeType>,

    pub orchestrator: Option<&'a Orchestrator>,
    pub composer: &'a dyn CompositionProcessor,
    pub matcher: &'a dyn SubstitutionMatcher,
}

/// Rebuild `derived` from its source topology.
///
/// Running it twice with unchanged inputs yields the same deployment topology.
pub fn regenerate(
    mut derived: DeploymentTopology,
    ctx: &GenerationContext<'_>,
) -> anyhow::Result<(DeploymentTopology, SubstitutionSnapshot)> {
    debug!("Regenerating deployment topology '{}' from '{}'", derived.id, ctx.source.id);

    derived.initial_topology_id.clone_from(&ctx.source.id);
    derived.last_sync_timestamp = Some(ctx.source.last_modified);
    derived.location_sync_timestamp =
        ctx.locations.values().map(|location| location.last_modified).max();

    let previous = std::mem::take(&mut derived.substituted_nodes);

    derived.template = ctx.source.template.clone();
    derived.original_nodes.clear();

    ctx.composer.process(&mut derived.template)?;

    apply_input_steps(&mut derived, ctx.source, ctx.orchestrator);

    let snapshot = resolve_available(
        &derived,
        SubstitutionInputs {
            resources: ctx.resources,
            node_types: ctx.node_types,
        },
        ctx.matcher,
    );
    process_substitutions(&mut derived, &snapshot, &previous)?;

    Ok((derived, snapshot))
}
