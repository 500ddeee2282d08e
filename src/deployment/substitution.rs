//! Substitution of abstract nodes by location resources.
//!
//! Availability is a snapshot: for every substitutable node placed on a
//! location, the resource templates of that location that can stand in for it.
//! Bindings are the deployment topology's `substituted_nodes` map. A bound node
//! mirrors its resource: the node takes the resource's type, and every
//! property and capability property present on the resource overrides the
//! node's value.
//!
//! Availability is always computed from the node as it was before substitution
//! (kept in `original_nodes`), so a bound node can still be re-bound to any
//! other candidate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{DeploymentTopology, SubstitutionSnapshot};
use crate::collaborators::SubstitutionMatcher;
use crate::core::{EntityKind, TopologyError};
use crate::models::{Capability, LocationResourceTemplate, LocationResources, NodeTemplate, NodeType};

/// How availability changes are detected against the stored bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDetection {
    /// The set of nodes with candidates differs from the set of bound nodes, or
    /// a bound resource is no longer a candidate of its node.
    #[default]
    Exact,

    /// The number of nodes with candidates differs from the number of bindings.
    Count,
}

impl ChangeDetection {
    /// Whether `bindings` no longer reflect `snapshot` and the deployment
    /// topology must be regenerated.
    #[must_use]
    pub fn requires_regeneration(
        self,
        snapshot: &SubstitutionSnapshot,
        bindings: &BTreeMap<String, String>,
    ) -> bool {
        let available = &snapshot.available_substitutions;
        match self {
            Self::Count => available.len() != bindings.len(),
            Self::Exact => {
                available.len() != bindings.len()
                    || bindings.iter().any(|(node_id, resource_id)| {
                        available.get(node_id).is_none_or(|candidates| !candidates.contains(resource_id))
                    })
            }
        }
    }
}

/// What the resolver needs to know about the location catalog.
#[derive(Debug, Clone, Copy)]
pub struct SubstitutionInputs<'a> {
    /// Resources offered by each placement location, keyed by location id.
    pub resources: &'a BTreeMap<String, LocationResources>,

    /// Node types of the topology's nodes before substitution, keyed by id.
    pub node_types: &'a BTreeMap<String, NodeType>,
}

/// Compute which resource templates can currently stand in for each node.
///
/// Only nodes with at least one candidate appear in the snapshot.
#[must_use]
pub fn resolve_available(
    derived: &DeploymentTopology,
    inputs: SubstitutionInputs<'_>,
    matcher: &dyn SubstitutionMatcher,
) -> SubstitutionSnapshot {
    let mut snapshot = SubstitutionSnapshot::default();

    for node_id in derived.template.node_templates.keys() {
        let Some(node) = derived.original_node(node_id) else {
            continue;
        };
        if !matcher.is_substitutable(node, inputs.node_types.get(&node.node_type)) {
            continue;
        }
        let Some(resources) =
            derived.assigned_location(node_id).and_then(|location| inputs.resources.get(location))
        else {
            debug!("Node '{}' is substitutable but not placed on a known location", node_id);
            continue;
        };

        for resource in &resources.node_templates {
            let resource_type = resources.node_types.get(resource.node_type());
            if !matcher.is_candidate(node, resource, resource_type) {
                continue;
            }

            snapshot
                .available_substitutions
                .entry(node_id.clone())
                .or_default()
                .insert(resource.id.clone());
            snapshot.substitution_templates.insert(resource.id.clone(), resource.clone());
            if let Some(resource_type) = resource_type {
                snapshot
                    .substitution_types
                    .insert(resource_type.id.clone(), resource_type.clone());
            }
        }
    }

    snapshot
}

/// Copy a resource's type and values onto a node.
///
/// Properties and capability properties present on the resource replace the
/// node's; other values of the node are kept.
pub fn mirror_resource(node: &mut NodeTemplate, resource: &LocationResourceTemplate) {
    node.node_type.clone_from(&resource.template.node_type);

    for (name, value) in &resource.template.properties {
        node.properties.insert(name.clone(), value.clone());
    }

    for (name, resource_capability) in &resource.template.capabilities {
        let capability = node
            .capabilities
            .entry(name.clone())
            .or_insert_with(|| Capability::new(&resource_capability.capability_type));
        for (property, value) in &resource_capability.properties {
            capability.properties.insert(property.clone(), value.clone());
        }
    }
}

/// Bind a node to a resource, starting from the node's pre-substitution template.
pub fn bind(
    derived: &mut DeploymentTopology,
    node_id: &str,
    resource: &LocationResourceTemplate,
) -> Result<(), TopologyError> {
    let original = derived
        .original_node(node_id)
        .cloned()
        .ok_or_else(|| TopologyError::not_found(EntityKind::Node, node_id))?;

    let mut substituted = original.clone();
    mirror_resource(&mut substituted, resource);

    derived.original_nodes.insert(node_id.to_string(), original);
    derived.template.node_templates.insert(node_id.to_string(), substituted);
    derived.substituted_nodes.insert(node_id.to_string(), resource.id.clone());
    Ok(())
}

/// Bind every node of the snapshot.
///
/// A previous binding is kept while its resource is still a candidate;
/// otherwise the first candidate by id is chosen. Nodes without candidates end
/// up unbound.
pub fn process_substitutions(
    derived: &mut DeploymentTopology,
    snapshot: &SubstitutionSnapshot,
    previous: &BTreeMap<String, String>,
) -> Result<(), TopologyError> {
    derived.substituted_nodes.clear();

    for (node_id, candidates) in &snapshot.available_substitutions {
        let kept = previous.get(node_id).filter(|resource_id| candidates.contains(*resource_id));
        let Some(resource_id) = kept.or_else(|| candidates.iter().next()) else {
            continue;
        };
        let resource = snapshot
            .substitution_templates
            .get(resource_id)
            .ok_or_else(|| TopologyError::not_found(EntityKind::ResourceTemplate, resource_id))?;

        match previous.get(node_id) {
            Some(old) if old == resource_id => {
                debug!("Keeping substitution of '{}' by '{}'", node_id, resource_id);
            }
            Some(old) => info!(
                "Substituting '{}' by '{}' (previous resource '{}' is no longer available)",
                node_id, resource_id, old
            ),
            None => info!("Substituting '{}' by '{}'", node_id, resource_id),
        }

        bind(derived, node_id, resource)?;
    }

    Ok(())
}

/// Re-apply every binding's resource values onto its node.
///
/// `templates` must contain the bound resources, keyed by id.
pub fn mirror_bound_templates(
    derived: &mut DeploymentTopology,
    templates: &BTreeMap<String, LocationResourceTemplate>,
) -> Result<(), TopologyError> {
    for (node_id, resource_id) in &derived.substituted_nodes {
        let resource = templates
            .get(resource_id)
            .ok_or_else(|| TopologyError::not_found(EntityKind::ResourceTemplate, resource_id))?;
        let node = derived
            .template
            .node_templates
            .get_mut(node_id)
            .ok_or_else(|| TopologyError::not_found(EntityKind::Node, node_id))?;
        mirror_resource(node, resource);
    }
    Ok(())
}
