//! In-memory store backed by concurrent maps.
//!
//! Every collection is a [`DashMap`], so a shared `MemoryStore` can be used from
//! several tasks at once. Saving a deployment topology holds the map entry for
//! the duration of the revision check, which makes the compare-and-write atomic.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::{BTreeMap, BTreeSet};

use super::{
    ApplicationRepository, DeploymentTopologyRepository, LocationCatalog, next_revision,
};
use crate::deployment::DeploymentTopology;
use crate::models::{
    ApplicationEnvironment, ApplicationVersion, Location, LocationResourceTemplate,
    LocationResources, NodeType, Orchestrator, Topology,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    environments: DashMap<String, ApplicationEnvironment>,
    versions: DashMap<String, ApplicationVersion>,
    topologies: DashMap<String, Topology>,
    locations: DashMap<String, Location>,
    resources: DashMap<String, LocationResourceTemplate>,
    node_types: DashMap<String, NodeType>,
    orchestrators: DashMap<String, Orchestrator>,
    deployment_topologies: DashMap<String, DeploymentTopology>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_environment(&self, environment: ApplicationEnvironment) {
        self.environments.insert(environment.id.clone(), environment);
    }

    pub fn insert_version(&self, version: ApplicationVersion) {
        self.versions.insert(version.id.clone(), version);
    }

    pub fn insert_topology(&self, topology: Topology) {
        self.topologies.insert(topology.id.clone(), topology);
    }

    pub fn insert_location(&self, location: Location) {
        self.locations.insert(location.id.clone(), location);
    }

    /// Remove a location and its resource templates.
    pub fn remove_location(&self, id: &str) -> Option<Location> {
        self.resources.retain(|_, resource| resource.location_id != id);
        self.locations.remove(id).map(|(_, location)| location)
    }

    pub fn insert_resource_template(&self, template: LocationResourceTemplate) {
        self.resources.insert(template.id.clone(), template);
    }

    pub fn insert_node_type(&self, node_type: NodeType) {
        self.node_types.insert(node_type.id.clone(), node_type);
    }

    pub fn insert_orchestrator(&self, orchestrator: Orchestrator) {
        self.orchestrators.insert(orchestrator.id.clone(), orchestrator);
    }

    /// Replace a stored deployment topology without a revision check.
    pub fn put_deployment_topology(&self, topology: DeploymentTopology) {
        self.deployment_topologies.insert(topology.id.clone(), topology);
    }

    #[must_use]
    pub fn deployment_topology_count(&self) -> usize {
        self.deployment_topologies.len()
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn find_environment(&self, id: &str) -> Result<Option<ApplicationEnvironment>> {
        Ok(self.environments.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_version(&self, id: &str) -> Result<Option<ApplicationVersion>> {
        Ok(self.versions.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_topology(&self, id: &str) -> Result<Option<Topology>> {
        Ok(self.topologies.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_versions_by_topology(
        &self,
        topology_id: &str,
    ) -> Result<Vec<ApplicationVersion>> {
        let mut versions: Vec<_> = self
            .versions
            .iter()
            .filter(|entry| entry.topology_id == topology_id)
            .map(|entry| entry.value().clone())
            .collect();
        versions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(versions)
    }

    async fn find_environments_by_version(
        &self,
        version_id: &str,
    ) -> Result<Vec<ApplicationEnvironment>> {
        let mut environments: Vec<_> = self
            .environments
            .iter()
            .filter(|entry| entry.current_version_id == version_id)
            .map(|entry| entry.value().clone())
            .collect();
        environments.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(environments)
    }
}

#[async_trait]
impl LocationCatalog for MemoryStore {
    async fn find_location(&self, id: &str) -> Result<Option<Location>> {
        Ok(self.locations.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_locations(&self, ids: &BTreeSet<String>) -> Result<BTreeMap<String, Location>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.locations.get(id).map(|entry| (id.clone(), entry.value().clone())))
            .collect())
    }

    async fn location_resources(&self, location_id: &str) -> Result<LocationResources> {
        let mut node_templates: Vec<_> = self
            .resources
            .iter()
            .filter(|entry| entry.location_id == location_id)
            .map(|entry| entry.value().clone())
            .collect();
        node_templates.sort_by(|a, b| a.id.cmp(&b.id));

        let type_ids: BTreeSet<String> =
            node_templates.iter().map(|template| template.node_type().to_string()).collect();
        let node_types = self.find_node_types(&type_ids).await?;

        Ok(LocationResources {
            node_templates,
            node_types,
        })
    }

    async fn find_resource_template(&self, id: &str) -> Result<Option<LocationResourceTemplate>> {
        Ok(self.resources.get(id).map(|entry| entry.value().clone()))
    }

    async fn save_resource_template(&self, template: &LocationResourceTemplate) -> Result<()> {
        self.resources.insert(template.id.clone(), template.clone());
        Ok(())
    }

    async fn save_location(&self, location: &Location) -> Result<()> {
        self.locations.insert(location.id.clone(), location.clone());
        Ok(())
    }

    async fn find_node_types(&self, ids: &BTreeSet<String>) -> Result<BTreeMap<String, NodeType>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.node_types.get(id).map(|entry| (id.clone(), entry.value().clone())))
            .collect())
    }

    async fn find_orchestrator(&self, id: &str) -> Result<Option<Orchestrator>> {
        Ok(self.orchestrators.get(id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl DeploymentTopologyRepository for MemoryStore {
    async fn find_deployment_topology(&self, id: &str) -> Result<Option<DeploymentTopology>> {
        Ok(self.deployment_topologies.get(id).map(|entry| entry.value().clone()))
    }

    async fn save_deployment_topology(
        &self,
        topology: &DeploymentTopology,
    ) -> Result<DeploymentTopology> {
        match self.deployment_topologies.entry(topology.id.clone()) {
            Entry::Occupied(mut entry) => {
                let next = next_revision(Some(entry.get()), topology)?;
                entry.insert(next.clone());
                Ok(next)
            }
            Entry::Vacant(entry) => {
                let next = next_revision(None, topology)?;
                entry.insert(next.clone());
                Ok(next)
            }
        }
    }

    async fn delete_deployment_topologies_by_environment(
        &self,
        environment_id: &str,
    ) -> Result<usize> {
        let before = self.deployment_topologies.len();
        self.deployment_topologies.retain(|_, topology| topology.environment_id != environment_id);
        Ok(before.saturating_sub(self.deployment_topologies.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TopologyError;
    use crate::models::NodeTemplate;
    use chrono::Utc;

    fn deployment(environment: &str) -> DeploymentTopology {
        DeploymentTopology::new(&ApplicationEnvironment::new(environment, "shop", "v1"), "topo")
    }

    #[tokio::test]
    async fn test_save_increments_revision() {
        let store = MemoryStore::new();

        let saved = store.save_deployment_topology(&deployment("prod")).await.unwrap();
        assert_eq!(saved.revision, 1);

        let saved = store.save_deployment_topology(&saved).await.unwrap();
        assert_eq!(saved.revision, 2);
        assert_eq!(store.find_deployment_topology(&saved.id).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_stale_save_is_rejected() {
        let store = MemoryStore::new();
        let first = store.save_deployment_topology(&deployment("prod")).await.unwrap();
        store.save_deployment_topology(&first).await.unwrap();

        let err = store.save_deployment_topology(&first).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TopologyError>(),
            Some(TopologyError::ConcurrentModification { expected: 1, found: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_by_environment() {
        let store = MemoryStore::new();
        store.save_deployment_topology(&deployment("prod")).await.unwrap();
        store.save_deployment_topology(&deployment("dev")).await.unwrap();

        assert_eq!(store.delete_deployment_topologies_by_environment("prod").await.unwrap(), 1);
        assert_eq!(store.delete_deployment_topologies_by_environment("prod").await.unwrap(), 0);
        assert_eq!(store.deployment_topology_count(), 1);
        assert!(store.find_deployment_topology("deployment-v1-dev").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_location_resources_and_removal() {
        let store = MemoryStore::new();
        store.insert_location(Location::new("aws", "cloudify", Utc::now()));
        store.insert_node_type(NodeType::new("aws.Compute"));
        store.insert_resource_template(LocationResourceTemplate::new(
            "medium",
            "aws",
            NodeTemplate::new("aws.Compute"),
        ));
        store.insert_resource_template(LocationResourceTemplate::new(
            "other",
            "gcp",
            NodeTemplate::new("gcp.Compute"),
        ));

        let resources = store.location_resources("aws").await.unwrap();
        assert_eq!(resources.node_templates.len(), 1);
        assert!(resources.node_types.contains_key("aws.Compute"));

        store.remove_location("aws");
        assert!(store.find_location("aws").await.unwrap().is_none());
        assert!(store.find_resource_template("medium").await.unwrap().is_none());
        assert!(store.find_resource_template("other").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_helpers_report_not_found() {
        let store = MemoryStore::new();
        let err = store.get_location("ghost").await.unwrap_err();
        assert!(TopologyError::is_not_found(&err));
        let err = store.get_environment("ghost").await.unwrap_err();
        assert!(TopologyError::is_not_found(&err));
    }
}
