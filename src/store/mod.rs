//! Persistence seams of the engine.
//!
//! The engine reads applications, topologies and the location catalog, and owns
//! exactly one kind of document: the deployment topology. Three traits split
//! those concerns:
//!
//! - [`ApplicationRepository`]: environments, versions and source topologies
//! - [`LocationCatalog`]: locations, resource templates, node types, orchestrators
//! - [`DeploymentTopologyRepository`]: deployment topologies
//!
//! [`Store`] is implemented by anything that provides all three. Two
//! implementations ship with the crate: [`MemoryStore`] and the JSON document
//! [`FileStore`] used by the CLI.
//!
//! # Concurrency
//!
//! Saving a deployment topology is an optimistic compare-and-write: the save is
//! rejected with [`TopologyError::ConcurrentModification`] when the stored
//! revision differs from the revision the caller loaded. A successful save
//! returns the stored document with its revision incremented.

pub mod file;
pub mod lock;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::{EntityKind, TopologyError};
use crate::deployment::DeploymentTopology;
use crate::models::{
    ApplicationEnvironment, ApplicationVersion, Location, LocationResourceTemplate,
    LocationResources, NodeType, Orchestrator, Topology,
};

pub use file::FileStore;
pub use lock::DocumentLock;
pub use memory::MemoryStore;

/// Applications and their source topologies.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_environment(&self, id: &str) -> Result<Option<ApplicationEnvironment>>;
    async fn find_version(&self, id: &str) -> Result<Option<ApplicationVersion>>;
    async fn find_topology(&self, id: &str) -> Result<Option<Topology>>;
    async fn find_versions_by_topology(&self, topology_id: &str)
    -> Result<Vec<ApplicationVersion>>;
    async fn find_environments_by_version(
        &self,
        version_id: &str,
    ) -> Result<Vec<ApplicationEnvironment>>;

    async fn get_environment(&self, id: &str) -> Result<ApplicationEnvironment> {
        self.find_environment(id)
            .await?
            .ok_or_else(|| TopologyError::not_found(EntityKind::Environment, id).into())
    }

    async fn get_version(&self, id: &str) -> Result<ApplicationVersion> {
        self.find_version(id)
            .await?
            .ok_or_else(|| TopologyError::not_found(EntityKind::Version, id).into())
    }

    async fn get_topology(&self, id: &str) -> Result<Topology> {
        self.find_topology(id)
            .await?
            .ok_or_else(|| TopologyError::not_found(EntityKind::Topology, id).into())
    }
}

/// Read access to the location catalog, plus resource template updates.
#[async_trait]
pub trait LocationCatalog: Send + Sync {
    async fn find_location(&self, id: &str) -> Result<Option<Location>>;

    /// Locations for the given ids, keyed by id. Unknown ids are omitted.
    async fn find_locations(&self, ids: &BTreeSet<String>) -> Result<BTreeMap<String, Location>>;

    /// Resource templates of a location with the node types they use.
    async fn location_resources(&self, location_id: &str) -> Result<LocationResources>;

    async fn find_resource_template(&self, id: &str) -> Result<Option<LocationResourceTemplate>>;
    async fn save_resource_template(&self, template: &LocationResourceTemplate) -> Result<()>;

    /// Replace a location, typically to advance its `last_modified`.
    async fn save_location(&self, location: &Location) -> Result<()>;

    /// Node types for the given ids, keyed by id. Unknown ids are omitted.
    async fn find_node_types(&self, ids: &BTreeSet<String>) -> Result<BTreeMap<String, NodeType>>;

    async fn find_orchestrator(&self, id: &str) -> Result<Option<Orchestrator>>;

    async fn get_location(&self, id: &str) -> Result<Location> {
        self.find_location(id)
            .await?
            .ok_or_else(|| TopologyError::not_found(EntityKind::Location, id).into())
    }

    async fn get_resource_template(&self, id: &str) -> Result<LocationResourceTemplate> {
        self.find_resource_template(id)
            .await?
            .ok_or_else(|| TopologyError::not_found(EntityKind::ResourceTemplate, id).into())
    }

    async fn get_node_type(&self, id: &str) -> Result<NodeType> {
        let ids = BTreeSet::from([id.to_string()]);
        self.find_node_types(&ids)
            .await?
            .remove(id)
            .ok_or_else(|| TopologyError::not_found(EntityKind::NodeType, id).into())
    }
}

/// Deployment topology documents.
#[async_trait]
pub trait DeploymentTopologyRepository: Send + Sync {
    async fn find_deployment_topology(&self, id: &str) -> Result<Option<DeploymentTopology>>;

    /// Store `topology` if the stored revision still matches its revision.
    ///
    /// Returns the stored document.
    async fn save_deployment_topology(
        &self,
        topology: &DeploymentTopology,
    ) -> Result<DeploymentTopology>;

    /// Delete every deployment topology of an environment, returning how many were removed.
    async fn delete_deployment_topologies_by_environment(&self, environment_id: &str)
    -> Result<usize>;
}

/// A store providing every repository the engine needs.
pub trait Store: ApplicationRepository + LocationCatalog + DeploymentTopologyRepository {}

impl<T> Store for T where T: ApplicationRepository + LocationCatalog + DeploymentTopologyRepository {}

/// Compare the stored revision with the incoming one and produce the document to store.
pub(crate) fn next_revision(
    stored: Option<&DeploymentTopology>,
    incoming: &DeploymentTopology,
) -> Result<DeploymentTopology, TopologyError> {
    let found = stored.map_or(0, |stored| stored.revision);
    if found != incoming.revision {
        return Err(TopologyError::ConcurrentModification {
            id: incoming.id.clone(),
            expected: incoming.revision,
            found,
        });
    }

    let mut next = incoming.clone();
    next.revision = found + 1;
    next.last_update = Some(Utc::now());
    Ok(next)
}

/// Reject ids that cannot be used as document names.
pub(crate) fn validate_document_id(id: &str) -> Result<(), TopologyError> {
    let invalid = id.trim().is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\', ':', '\0'])
        || id.contains("..");
    if invalid {
        return Err(TopologyError::InvalidArgument {
            reason: format!("'{id}' is not a valid document id"),
        });
    }
    Ok(())
}
