//! Sample catalog shared by unit and integration tests.
//!
//! The catalog describes one application (`shop`) with version `v1` deployed to
//! environment `prod`. Its topology `webapp` has:
//!
//! - `server`: an abstract `tosca.nodes.Compute` whose `flavor` and `replicas`
//!   properties come from inputs
//! - `app`: a concrete `custom.App` that is never substituted
//!
//! Location `aws` offers `aws-large` and `aws-medium` (`aws.Compute`, sizes L and M),
//! location `gcp` offers `gcp-small`. User `alice` is a deployer on both.

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeSet;

use crate::constants::collections;
use crate::models::{
    ApplicationEnvironment, ApplicationVersion, Capability, CapabilityDefinition, Location,
    LocationResourceTemplate, NodeTemplate, NodeType, Orchestrator, PropertyConstraint,
    PropertyDefinition, PropertyType, PropertyValue, Topology,
};
use crate::store::{FileStore, LocationCatalog, MemoryStore};

pub const ENVIRONMENT_ID: &str = "prod";
pub const VERSION_ID: &str = "v1";
pub const TOPOLOGY_ID: &str = "webapp";
pub const ORCHESTRATOR_ID: &str = "cloudify";
pub const DEPLOYER: &str = "alice";

#[derive(Debug, Clone)]
pub struct CatalogFixture {
    pub topology: Topology,
    pub version: ApplicationVersion,
    pub environment: ApplicationEnvironment,
    pub locations: Vec<Location>,
    pub resources: Vec<LocationResourceTemplate>,
    pub node_types: Vec<NodeType>,
    pub orchestrator: Orchestrator,
}

/// Fixed reference time of the sample catalog.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap_or_else(Utc::now)
}

fn scalar(value: &str) -> Option<PropertyValue> {
    Some(PropertyValue::scalar(value))
}

fn location(id: &str, modified: DateTime<Utc>) -> Location {
    let mut location = Location::new(id, ORCHESTRATOR_ID, modified);
    location
        .user_roles
        .insert(DEPLOYER.to_string(), BTreeSet::from(["DEPLOYER".to_string()]));
    location
}

fn compute(id: &str, location_id: &str, size: &str) -> LocationResourceTemplate {
    LocationResourceTemplate::new(
        id,
        location_id,
        NodeTemplate::new(format!("{location_id}.Compute"))
            .with_property("size", scalar(size))
            .with_capability("host", Capability::new("tosca.capabilities.Container")),
    )
}

fn concrete_compute(id: &str) -> NodeType {
    NodeType::new(id)
        .derived_from("tosca.nodes.Compute")
        .with_property(
            "size",
            PropertyDefinition::string().with_constraint(PropertyConstraint::ValidValues(vec![
                "S".into(),
                "M".into(),
                "L".into(),
            ])),
        )
        .with_capability(
            "host",
            CapabilityDefinition {
                capability_type: "tosca.capabilities.Container".into(),
                properties: [(
                    "num_cpus".to_string(),
                    PropertyDefinition::of_type(PropertyType::Integer)
                        .with_constraint(PropertyConstraint::GreaterOrEqual(1.0)),
                )]
                .into_iter()
                .collect(),
            },
        )
}

impl CatalogFixture {
    pub fn new() -> Self {
        let modified = reference_time();

        let topology = Topology::new(TOPOLOGY_ID, modified)
            .with_input(
                "flavor",
                PropertyDefinition::string().with_default("small").with_constraint(
                    PropertyConstraint::ValidValues(vec!["small".into(), "large".into()]),
                ),
            )
            .with_input("replicas", PropertyDefinition::of_type(PropertyType::Integer))
            .with_node(
                "server",
                NodeTemplate::new("tosca.nodes.Compute")
                    .with_property("flavor", Some(PropertyValue::get_input("flavor")))
                    .with_property("replicas", Some(PropertyValue::get_input("replicas")))
                    .with_capability("host", Capability::new("tosca.capabilities.Container")),
            )
            .with_node("app", NodeTemplate::new("custom.App").with_property("port", scalar("8080")));

        let mut orchestrator = Orchestrator::new(ORCHESTRATOR_ID);
        orchestrator.deployment_properties.insert(
            "region".to_string(),
            PropertyDefinition::string().with_default("us-east-1"),
        );

        Self {
            topology,
            version: ApplicationVersion::new(VERSION_ID, "shop", TOPOLOGY_ID),
            environment: ApplicationEnvironment::new(ENVIRONMENT_ID, "shop", VERSION_ID),
            locations: vec![
                location("aws", modified - Duration::hours(1)),
                location("gcp", modified - Duration::hours(1)),
            ],
            resources: vec![
                compute("aws-large", "aws", "L"),
                compute("aws-medium", "aws", "M"),
                compute("gcp-small", "gcp", "S"),
            ],
            node_types: vec![
                NodeType::new("tosca.nodes.Compute").abstract_type().with_capability(
                    "host",
                    CapabilityDefinition {
                        capability_type: "tosca.capabilities.Container".into(),
                        properties: Default::default(),
                    },
                ),
                concrete_compute("aws.Compute"),
                concrete_compute("gcp.Compute"),
                NodeType::new("custom.App"),
            ],
            orchestrator,
        }
    }

    pub fn memory_store(&self) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_topology(self.topology.clone());
        store.insert_version(self.version.clone());
        store.insert_environment(self.environment.clone());
        store.insert_orchestrator(self.orchestrator.clone());
        for location in &self.locations {
            store.insert_location(location.clone());
        }
        for resource in &self.resources {
            store.insert_resource_template(resource.clone());
        }
        for node_type in &self.node_types {
            store.insert_node_type(node_type.clone());
        }
        store
    }

    /// Write every document of the catalog into a file store.
    pub async fn write_to(&self, store: &FileStore) -> Result<()> {
        store.put(collections::TOPOLOGIES, &self.topology.id, &self.topology).await?;
        store.put(collections::VERSIONS, &self.version.id, &self.version).await?;
        store.put(collections::ENVIRONMENTS, &self.environment.id, &self.environment).await?;
        store
            .put(collections::ORCHESTRATORS, &self.orchestrator.id, &self.orchestrator)
            .await?;
        for location in &self.locations {
            store.put(collections::LOCATIONS, &location.id, location).await?;
        }
        for resource in &self.resources {
            store.save_resource_template(resource).await?;
        }
        for node_type in &self.node_types {
            store.put(collections::TYPES, &node_type.id, node_type).await?;
        }
        Ok(())
    }
}

impl Default for CatalogFixture {
    fn default() -> Self {
        Self::new()
    }
}
