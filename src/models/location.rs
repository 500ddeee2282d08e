//! Locations and their on-demand resources.
//!
//! These documents are owned by the location catalog. The engine reads them, and
//! writes back resource template property values only when a user overrides a
//! property of a substituted node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::property::PropertyDefinition;
use super::topology::{CsarDependency, NodeTemplate};

/// An infrastructure target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub orchestrator_id: String,
    pub last_modified: DateTime<Utc>,

    /// Type archives the location's resources are defined in.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<CsarDependency>,

    /// Roles granted per user name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_roles: BTreeMap<String, BTreeSet<String>>,

    /// Roles granted per user group.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub group_roles: BTreeMap<String, BTreeSet<String>>,
}

impl Location {
    pub fn new(
        id: impl Into<String>,
        orchestrator_id: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            orchestrator_id: orchestrator_id.into(),
            last_modified,
            dependencies: BTreeSet::new(),
            user_roles: BTreeMap::new(),
            group_roles: BTreeMap::new(),
        }
    }
}

/// A concrete, location-scoped instantiation of a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResourceTemplate {
    pub id: String,
    pub name: String,
    pub location_id: String,

    /// Whether this resource can be used for substitution.
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub template: NodeTemplate,
}

fn default_true() -> bool {
    true
}

impl LocationResourceTemplate {
    pub fn new(id: impl Into<String>, location_id: impl Into<String>, template: NodeTemplate) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            location_id: location_id.into(),
            enabled: true,
            template,
        }
    }

    /// The resource's node type id.
    #[must_use]
    pub fn node_type(&self) -> &str {
        &self.template.node_type
    }
}

/// Definition of a capability on a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CapabilityDefinition {
    #[serde(rename = "type")]
    pub capability_type: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyDefinition>,
}

/// A node type known to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeType {
    pub id: String,

    /// Parent type ids, nearest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_from: Vec<String>,

    /// Abstract types must be substituted by a location resource to be deployed.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyDefinition>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, CapabilityDefinition>,
}

impl NodeType {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            derived_from: Vec::new(),
            is_abstract: false,
            properties: BTreeMap::new(),
            capabilities: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    #[must_use]
    pub fn derived_from(mut self, parent: impl Into<String>) -> Self {
        self.derived_from.push(parent.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, definition: PropertyDefinition) -> Self {
        self.properties.insert(name.into(), definition);
        self
    }

    #[must_use]
    pub fn with_capability(
        mut self,
        name: impl Into<String>,
        definition: CapabilityDefinition,
    ) -> Self {
        self.capabilities.insert(name.into(), definition);
        self
    }

    /// Whether this type is `type_id` or derives from it.
    #[must_use]
    pub fn is_a(&self, type_id: &str) -> bool {
        self.id == type_id || self.derived_from.iter().any(|parent| parent == type_id)
    }
}

/// The types and templates a location offers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationResources {
    pub node_templates: Vec<LocationResourceTemplate>,

    /// Node types referenced by the templates, keyed by id.
    pub node_types: BTreeMap<String, NodeType>,
}

/// An orchestrator and the deployment properties it accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orchestrator {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deployment_properties: BTreeMap<String, PropertyDefinition>,
}

impl Orchestrator {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            deployment_properties: BTreeMap::new(),
        }
    }
}

