//! JSON document store on the local filesystem.
//!
//! Each collection is a directory under the store root and each document a
//! pretty-printed JSON file named after its id:
//!
//! ```text
//! .topo-sync/
//! ├── topologies/topo-1.json
//! ├── versions/v1.json
//! ├── environments/prod.json
//! ├── locations/aws.json
//! ├── resources/medium.json
//! ├── types/tosca.nodes.Compute.json
//! ├── orchestrators/cloudify.json
//! ├── deployment-topologies/deployment-v1-prod.json
//! └── .locks/
//! ```
//!
//! Writes go through a temporary file and a rename, so a reader never sees a
//! partially written document. Deployment topology saves additionally hold a
//! [`DocumentLock`] for the read-compare-write of the revision.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{
    ApplicationRepository, DeploymentTopologyRepository, DocumentLock, LocationCatalog,
    next_revision, validate_document_id,
};
use crate::constants::collections;
use crate::deployment::DeploymentTopology;
use crate::models::{
    ApplicationEnvironment, ApplicationVersion, Location, LocationResourceTemplate,
    LocationResources, NodeType, Orchestrator, Topology,
};
use crate::utils::fs::{atomic_write, remove_if_exists};

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        validate_document_id(id)?;
        Ok(self.root.join(collection).join(format!("{id}.json")))
    }

    async fn read<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        let path = self.document_path(collection, id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        let document = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(document))
    }

    async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let dir = self.root.join(collection);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", dir.display()));
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            documents.push(
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?,
            );
        }
        Ok(documents)
    }

    /// Write a document into a collection, replacing any previous version.
    pub async fn put<T: Serialize>(&self, collection: &str, id: &str, document: &T) -> Result<()> {
        let path = self.document_path(collection, id)?;
        let content = serde_json::to_string_pretty(document)
            .with_context(|| format!("Failed to serialize document '{id}'"))?;

        tokio::task::spawn_blocking(move || atomic_write(&path, content.as_bytes()))
            .await
            .context("Failed to spawn blocking task for document write")??;
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool> {
        let path = self.document_path(collection, id)?;
        tokio::task::spawn_blocking(move || remove_if_exists(&path))
            .await
            .context("Failed to spawn blocking task for document removal")?
    }
}

#[async_trait]
impl ApplicationRepository for FileStore {
    async fn find_environment(&self, id: &str) -> Result<Option<ApplicationEnvironment>> {
        self.read(collections::ENVIRONMENTS, id).await
    }

    async fn find_version(&self, id: &str) -> Result<Option<ApplicationVersion>> {
        self.read(collections::VERSIONS, id).await
    }

    async fn find_topology(&self, id: &str) -> Result<Option<Topology>> {
        self.read(collections::TOPOLOGIES, id).await
    }

    async fn find_versions_by_topology(
        &self,
        topology_id: &str,
    ) -> Result<Vec<ApplicationVersion>> {
        let versions: Vec<ApplicationVersion> = self.list(collections::VERSIONS).await?;
        Ok(versions.into_iter().filter(|version| version.topology_id == topology_id).collect())
    }

    async fn find_environments_by_version(
        &self,
        version_id: &str,
    ) -> Result<Vec<ApplicationEnvironment>> {
        let environments: Vec<ApplicationEnvironment> =
            self.list(collections::ENVIRONMENTS).await?;
        Ok(environments
            .into_iter()
            .filter(|environment| environment.current_version_id == version_id)
            .collect())
    }
}

#[async_trait]
impl LocationCatalog for FileStore {
    async fn find_location(&self, id: &str) -> Result<Option<Location>> {
        self.read(collections::LOCATIONS, id).await
    }

    async fn find_locations(&self, ids: &BTreeSet<String>) -> Result<BTreeMap<String, Location>> {
        let mut found = BTreeMap::new();
        for id in ids {
            if let Some(location) = self.find_location(id).await? {
                found.insert(id.clone(), location);
            }
        }
        Ok(found)
    }

    async fn location_resources(&self, location_id: &str) -> Result<LocationResources> {
        let templates: Vec<LocationResourceTemplate> = self.list(collections::RESOURCES).await?;
        let node_templates: Vec<_> = templates
            .into_iter()
            .filter(|template| template.location_id == location_id)
            .collect();

        let type_ids: BTreeSet<String> =
            node_templates.iter().map(|template| template.node_type().to_string()).collect();
        let node_types = self.find_node_types(&type_ids).await?;

        Ok(LocationResources {
            node_templates,
            node_types,
        })
    }

    async fn find_resource_template(&self, id: &str) -> Result<Option<LocationResourceTemplate>> {
        self.read(collections::RESOURCES, id).await
    }

    async fn save_resource_template(&self, template: &LocationResourceTemplate) -> Result<()> {
        self.put(collections::RESOURCES, &template.id, template).await
    }

    async fn save_location(&self, location: &Location) -> Result<()> {
        self.put(collections::LOCATIONS, &location.id, location).await
    }

    async fn find_node_types(&self, ids: &BTreeSet<String>) -> Result<BTreeMap<String, NodeType>> {
        let mut found = BTreeMap::new();
        for id in ids {
            if let Some(node_type) = self.read::<NodeType>(collections::TYPES, id).await? {
                found.insert(id.clone(), node_type);
            }
        }
        Ok(found)
    }

    async fn find_orchestrator(&self, id: &str) -> Result<Option<Orchestrator>> {
        self.read(collections::ORCHESTRATORS, id).await
    }
}

#[async_trait]
impl DeploymentTopologyRepository for FileStore {
    async fn find_deployment_topology(&self, id: &str) -> Result<Option<DeploymentTopology>> {
        self.read(collections::DEPLOYMENT_TOPOLOGIES, id).await
    }

    async fn save_deployment_topology(
        &self,
        topology: &DeploymentTopology,
    ) -> Result<DeploymentTopology> {
        validate_document_id(&topology.id)?;
        let _lock = DocumentLock::acquire(&self.root, &topology.id).await?;

        let stored = self.find_deployment_topology(&topology.id).await?;
        let next = next_revision(stored.as_ref(), topology)?;
        self.put(collections::DEPLOYMENT_TOPOLOGIES, &next.id, &next).await?;
        Ok(next)
    }

    async fn delete_deployment_topologies_by_environment(
        &self,
        environment_id: &str,
    ) -> Result<usize> {
        let topologies: Vec<DeploymentTopology> =
            self.list(collections::DEPLOYMENT_TOPOLOGIES).await?;

        let mut removed = 0;
        for topology in topologies.iter().filter(|t| t.environment_id == environment_id) {
            let _lock = DocumentLock::acquire(&self.root, &topology.id).await?;
            if self.remove(collections::DEPLOYMENT_TOPOLOGIES, &topology.id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
