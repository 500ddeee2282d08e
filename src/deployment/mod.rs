//! Deployment topologies and the engine that keeps them synchronized.
//!
//! A [`DeploymentTopology`] is the location-bound copy of a source topology for
//! one (application version, environment) pair. It embeds the source's
//! [`TopologyTemplate`] and adds the deployment-only state: placement groups,
//! substitution bindings, processed inputs and bookkeeping timestamps.
//!
//! # Module Organization
//!
//! - [`staleness`]: decides whether a stored deployment topology must be rebuilt
//! - [`generator`]: rebuilds a deployment topology from its source, in memory
//! - [`inputs`]: input properties, `get_input` resolution, artifacts, finalization
//! - [`substitution`]: candidate resolution, bindings and property mirroring
//! - [`location_policy`]: group to location placement
//! - [`properties`]: property overrides on substituted nodes
//! - [`service`]: the façade that loads, rebuilds and saves

pub mod generator;
pub mod inputs;
pub mod location_policy;
pub mod properties;
pub mod service;
pub mod staleness;
pub mod substitution;


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::{DEPLOYMENT_ID_PREFIX, GROUP_ALL};
use crate::models::{
    ApplicationEnvironment, CsarDependency, DeploymentArtifact, LocationResourceTemplate,
    NodeGroup, NodeTemplate, NodeType, PropertyMap, TopologyTemplate,
};

pub use service::DeploymentTopologyService;
pub use substitution::ChangeDetection;

/// Deterministic id of the deployment topology of a version in an environment.
#[must_use]
pub fn generate_id(version_id: &str, environment_id: &str) -> String {
    format!("{DEPLOYMENT_ID_PREFIX}-{version_id}-{environment_id}")
}

/// The derived, location-bound topology of one version in one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTopology {
    pub id: String,
    pub version_id: String,
    pub environment_id: String,

    /// The source topology this one is derived from.
    pub initial_topology_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_id: Option<String>,

    /// Last-modified time of the source topology at the last regeneration.
    #[serde(default)]
    pub last_sync_timestamp: Option<DateTime<Utc>>,

    /// Latest last-modified time of the placement locations at the last regeneration.
    #[serde(default)]
    pub location_sync_timestamp: Option<DateTime<Utc>>,

    /// Time of the last successful save.
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,

    /// Save counter used for optimistic concurrency checks.
    #[serde(default)]
    pub revision: u64,

    #[serde(flatten)]
    pub template: TopologyTemplate,

    /// Pre-substitution templates of the substituted nodes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub original_nodes: BTreeMap<String, NodeTemplate>,

    /// Dependencies contributed by the placement locations.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub location_dependencies: BTreeSet<CsarDependency>,

    /// Placement groups keyed by group name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub location_groups: BTreeMap<String, NodeGroup>,

    /// Substitution bindings: node id to location resource template id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub substituted_nodes: BTreeMap<String, String>,

    /// Effective deployment input values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_properties: PropertyMap,

    /// Artifacts supplied by the environment for the topology's input artifacts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub uploaded_input_artifacts: BTreeMap<String, DeploymentArtifact>,

    /// Orchestrator specific deployment properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_deployment_properties: BTreeMap<String, String>,
}

impl DeploymentTopology {
    /// An empty, never synchronized deployment topology.
    pub fn new(environment: &ApplicationEnvironment, topology_id: impl Into<String>) -> Self {
        Self::empty(
            generate_id(&environment.current_version_id, &environment.id),
            environment.current_version_id.clone(),
            environment.id.clone(),
            topology_id.into(),
        )
    }

    fn empty(id: String, version_id: String, environment_id: String, topology_id: String) -> Self {
        Self {
            id,
            version_id,
            environment_id,
            initial_topology_id: topology_id,
            orchestrator_id: None,
            last_sync_timestamp: None,
            location_sync_timestamp: None,
            last_update: None,
            revision: 0,
            template: TopologyTemplate::default(),
            original_nodes: BTreeMap::new(),
            location_dependencies: BTreeSet::new(),
            location_groups: BTreeMap::new(),
            substituted_nodes: BTreeMap::new(),
            input_properties: PropertyMap::new(),
            uploaded_input_artifacts: BTreeMap::new(),
            provider_deployment_properties: BTreeMap::new(),
        }
    }

    /// A fresh record for the same environment.
    ///
    /// Placement, bindings and synchronization state are dropped. The revision
    /// is kept so the next save still replaces the stored document, and the
    /// user's input values and uploaded artifacts are kept.
    #[must_use]
    pub fn reset(self, topology_id: impl Into<String>) -> Self {
        Self {
            revision: self.revision,
            last_update: self.last_update,
            input_properties: self.input_properties,
            uploaded_input_artifacts: self.uploaded_input_artifacts,
            ..Self::empty(self.id, self.version_id, self.environment_id, topology_id.into())
        }
    }

    /// Location id per placement group, read from the groups' placement policies.
    #[must_use]
    pub fn location_ids(&self) -> BTreeMap<String, String> {
        self.location_groups
            .iter()
            .filter_map(|(name, group)| {
                group
                    .policies
                    .iter()
                    .find_map(|policy| policy.location_id())
                    .map(|location_id| (name.clone(), location_id.to_string()))
            })
            .collect()
    }

    /// The location a node is placed on, if any.
    ///
    /// The [`GROUP_ALL`] group and groups without explicit members cover every node.
    #[must_use]
    pub fn assigned_location(&self, node_id: &str) -> Option<&str> {
        self.location_groups
            .iter()
            .filter(|(name, group)| {
                name.as_str() == GROUP_ALL
                    || group.members.is_empty()
                    || group.members.contains(node_id)
            })
            .find_map(|(_, group)| group.policies.iter().find_map(|policy| policy.location_id()))
    }

    /// The node as it was before substitution, or the node itself.
    #[must_use]
    pub fn original_node(&self, node_id: &str) -> Option<&NodeTemplate> {
        self.original_nodes
            .get(node_id)
            .or_else(|| self.template.node_templates.get(node_id))
    }

    /// Type ids of the nodes before substitution.
    #[must_use]
    pub fn original_node_types(&self) -> BTreeSet<String> {
        self.template
            .node_templates
            .keys()
            .filter_map(|id| self.original_node(id))
            .map(|node| node.node_type.clone())
            .collect()
    }

    /// Source and location dependencies together.
    #[must_use]
    pub fn all_dependencies(&self) -> BTreeSet<CsarDependency> {
        self.template.dependencies.union(&self.location_dependencies).cloned().collect()
    }

    /// SHA-256 of the synchronized content, ignoring bookkeeping fields.
    ///
    /// Two deployment topologies with the same fingerprint carry the same nodes,
    /// placement, bindings and inputs.
    pub fn fingerprint(&self) -> anyhow::Result<String> {
        let content = serde_json::json!({
            "template": &self.template,
            "location_groups": &self.location_groups,
            "substituted_nodes": &self.substituted_nodes,
            "input_properties": &self.input_properties,
            "provider_deployment_properties": &self.provider_deployment_properties,
        });
        let bytes = serde_json::to_vec(&content)?;
        Ok(format!("sha256:{}", hex::encode(Sha256::digest(&bytes))))
    }
}

/// Current availability of location resources for the substitutable nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubstitutionSnapshot {
    /// Candidate resource template ids per node, for nodes with at least one candidate.
    pub available_substitutions: BTreeMap<String, BTreeSet<String>>,

    /// Every candidate resource template, keyed by id.
    pub substitution_templates: BTreeMap<String, LocationResourceTemplate>,

    /// Node types of the candidate resource templates, keyed by id.
    pub substitution_types: BTreeMap<String, NodeType>,
}

/// A deployment topology together with its substitution availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfiguration {
    pub deployment_topology: DeploymentTopology,
    pub availability: SubstitutionSnapshot,
}
