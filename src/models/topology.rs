//! Source topology templates.
//!
//! A [`Topology`] is the author-defined, location independent application
//! structure. Its body is a [`TopologyTemplate`], which is also embedded in every
//! deployment topology derived from it: regeneration replaces that body wholesale
//! while the deployment-only fields survive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::property::{PropertyDefinition, PropertyMap, PropertyValue};

/// A source topology and its last modification time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub id: String,
    pub last_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub template: TopologyTemplate,
}

impl Topology {
    pub fn new(id: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            last_modified,
            template: TopologyTemplate::default(),
        }
    }

    #[must_use]
    pub fn with_node(mut self, name: impl Into<String>, node: NodeTemplate) -> Self {
        self.template.node_templates.insert(name.into(), node);
        self
    }

    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, definition: PropertyDefinition) -> Self {
        self.template.inputs.insert(name.into(), definition);
        self
    }
}

/// The mergeable body of a topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TopologyTemplate {
    #[serde(default)]
    pub node_templates: BTreeMap<String, NodeTemplate>,

    /// Author-defined node groups (distinct from location placement groups).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, NodeGroup>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, PropertyDefinition>,

    /// Artifacts that each environment may supply its own file for.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_artifacts: BTreeMap<String, DeploymentArtifact>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<CsarDependency>,
}

/// A node of a topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTemplate {
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default)]
    pub properties: PropertyMap,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, Capability>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, RelationshipTemplate>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, DeploymentArtifact>,
}

impl NodeTemplate {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            properties: PropertyMap::new(),
            capabilities: BTreeMap::new(),
            relationships: BTreeMap::new(),
            artifacts: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: Option<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_capability(mut self, name: impl Into<String>, capability: Capability) -> Self {
        self.capabilities.insert(name.into(), capability);
        self
    }

    #[must_use]
    pub fn with_artifact(mut self, name: impl Into<String>, artifact: DeploymentArtifact) -> Self {
        self.artifacts.insert(name.into(), artifact);
        self
    }

    /// Every property map held by this node: its own, its capabilities' and its
    /// relationships'.
    pub fn property_maps_mut(&mut self) -> impl Iterator<Item = &mut PropertyMap> {
        std::iter::once(&mut self.properties)
            .chain(self.capabilities.values_mut().map(|capability| &mut capability.properties))
            .chain(self.relationships.values_mut().map(|relationship| &mut relationship.properties))
    }

    /// Every property map held by this node, read-only.
    pub fn property_maps(&self) -> impl Iterator<Item = &PropertyMap> {
        std::iter::once(&self.properties)
            .chain(self.capabilities.values().map(|capability| &capability.properties))
            .chain(self.relationships.values().map(|relationship| &relationship.properties))
    }
}

/// A capability of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    #[serde(rename = "type")]
    pub capability_type: String,

    #[serde(default)]
    pub properties: PropertyMap,
}

impl Capability {
    pub fn new(capability_type: impl Into<String>) -> Self {
        Self {
            capability_type: capability_type.into(),
            properties: PropertyMap::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: Option<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

/// A relationship from a node to another node of the same topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipTemplate {
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement_name: Option<String>,

    #[serde(default)]
    pub properties: PropertyMap,
}

/// A deployable artifact attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentArtifact {
    #[serde(rename = "type")]
    pub artifact_type: String,

    /// Location of the artifact content.
    pub reference: String,

    /// Name of the topology input artifact this artifact is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_artifact: Option<String>,
}

/// A named group of nodes with an ordered list of policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub name: String,

    /// Member node ids. Empty for the implicit group of all nodes.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub members: BTreeSet<String>,

    #[serde(default)]
    pub policies: Vec<Policy>,
}

impl NodeGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeSet::new(),
            policies: Vec::new(),
        }
    }
}

/// A policy attached to a node group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Policy {
    /// Binds the group to a location.
    LocationPlacement {
        name: String,
        location_id: String,
    },
}

impl Policy {
    /// The location id if this is a placement policy.
    #[must_use]
    pub fn location_id(&self) -> Option<&str> {
        match self {
            Self::LocationPlacement {
                location_id,
                ..
            } => Some(location_id),
        }
    }
}

/// A dependency on a type archive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CsarDependency {
    pub name: String,
    pub version: String,
}

impl CsarDependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}
