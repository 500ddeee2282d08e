//! The synchronization façade.
//!
//! [`DeploymentTopologyService`] is what the rest of the system talks to. It
//! loads a deployment topology, decides whether it must be rebuilt, rebuilds it
//! in memory and stores it with a single save. Every mutating operation works on
//! a copy and only replaces the caller's value once the save succeeded, so a
//! failed operation leaves both the caller's copy and the stored document as
//! they were.
//!
//! # Synchronization
//!
//! On every read the stored deployment topology is checked against its sources:
//!
//! - no stored document: create and generate one
//! - a placement location no longer exists: start over from a fresh record
//! - the source topology or a placement location changed: regenerate in place
//! - the substitution availability no longer matches the bindings: regenerate
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topology_sync::deployment::DeploymentTopologyService;
//! use topology_sync::store::MemoryStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = DeploymentTopologyService::new(Arc::new(MemoryStore::new()));
//! let configuration = service.get_deployment_configuration("prod").await?;
//! println!("{} is at revision {}", configuration.deployment_topology.id,
//!     configuration.deployment_topology.revision);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use chrono::{Duration, Utc};
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::generator::{GenerationContext, regenerate};
use super::inputs::{apply_input_steps, finalize};
use super::location_policy::LocationPolicyBuilder;
use super::properties::{bound_resource_id, set_capability_property, set_node_property};
use super::staleness::{LocationResolution, check_staleness, resolve_locations};
use super::substitution::{
    ChangeDetection, SubstitutionInputs, bind, mirror_bound_templates, resolve_available,
};
use super::{DeploymentConfiguration, DeploymentTopology, SubstitutionSnapshot, generate_id};
use crate::collaborators::{
    AllowAll, Authorizer, CompositionProcessor, NoComposition, RoleAuthorizer,
    SubstitutionMatcher, TypeHierarchyMatcher,
};
use crate::config::EngineConfig;
use crate::constants::DEPLOYER_ROLES;
use crate::core::{EntityKind, TopologyError};
use crate::models::{
    DeploymentArtifact, Location, LocationResourceTemplate, LocationResources, NodeType,
    Orchestrator, PropertyValue, Topology,
};
use crate::store::Store;
use crate::validation::validate_value;

/// Everything a deployment topology is generated from.
struct Sources {
    topology: Topology,
    /// Keyed by group name.
    locations: BTreeMap<String, Location>,
    /// Keyed by location id.
    resources: BTreeMap<String, LocationResources>,
    node_types: BTreeMap<String, NodeType>,
    orchestrator: Option<Orchestrator>,
}

impl Sources {
    fn substitution_inputs(&self) -> SubstitutionInputs<'_> {
        SubstitutionInputs {
            resources: &self.resources,
            node_types: &self.node_types,
        }
    }
}

/// Keeps deployment topologies synchronized with their sources.
pub struct DeploymentTopologyService<S: Store> {
    store: Arc<S>,
    authorizer: Box<dyn Authorizer>,
    matcher: Box<dyn SubstitutionMatcher>,
    composer: Box<dyn CompositionProcessor>,
    change_detection: ChangeDetection,
}

impl<S: Store> DeploymentTopologyService<S> {
    /// A service that authorizes everything, substitutes abstract nodes and
    /// performs no composition.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            authorizer: Box::new(AllowAll),
            matcher: Box::new(TypeHierarchyMatcher),
            composer: Box::new(NoComposition),
            change_detection: ChangeDetection::default(),
        }
    }

    /// A service configured from an [`EngineConfig`].
    ///
    /// Location roles are checked when the configuration names a user.
    pub fn from_config(store: Arc<S>, config: &EngineConfig) -> Self {
        let service = Self::new(store).with_change_detection(config.substitution_change_detection);
        match &config.user {
            Some(user) => service.with_authorizer(RoleAuthorizer::new(user, config.groups.clone())),
            None => service,
        }
    }

    #[must_use]
    pub fn with_authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Box::new(authorizer);
        self
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: impl SubstitutionMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    #[must_use]
    pub fn with_composer(mut self, composer: impl CompositionProcessor + 'static) -> Self {
        self.composer = Box::new(composer);
        self
    }

    #[must_use]
    pub fn with_change_detection(mut self, change_detection: ChangeDetection) -> Self {
        self.change_detection = change_detection;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Load, create or regenerate the deployment topology of an environment and
    /// return it with its current substitution availability.
    ///
    /// A second regeneration happens when the availability no longer matches
    /// the stored bindings.
    pub async fn get_deployment_configuration(
        &self,
        environment_id: &str,
    ) -> Result<DeploymentConfiguration> {
        let (derived, sources) = self.get_or_create(environment_id).await?;
        let availability = self.availability(&derived, &sources);

        if !self.change_detection.requires_regeneration(&availability, &derived.substituted_nodes) {
            return Ok(DeploymentConfiguration {
                deployment_topology: derived,
                availability,
            });
        }

        info!(
            "Substitution availability of '{}' changed ({} nodes available, {} bound), regenerating",
            derived.id,
            availability.available_substitutions.len(),
            derived.substituted_nodes.len()
        );
        let (deployment_topology, availability) = self.regenerate_and_save(derived, &sources).await?;
        Ok(DeploymentConfiguration {
            deployment_topology,
            availability,
        })
    }

    /// Place the environment's deployment on locations.
    ///
    /// The mapping is validated before anything is read. Every location must
    /// exist and grant the caller a deployer role. The deployment topology is
    /// then rebuilt from a fresh record, keeping the user's inputs and, while
    /// still available, their substitution choices. An empty mapping removes
    /// the placement.
    pub async fn set_location_policies(
        &self,
        environment_id: &str,
        orchestrator_id: &str,
        group_to_location: &BTreeMap<String, String>,
    ) -> Result<DeploymentConfiguration> {
        let builder = LocationPolicyBuilder::from_mapping(group_to_location)?;

        let environment = self.store.get_environment(environment_id).await?;
        let version = self.store.get_version(&environment.current_version_id).await?;
        let topology = self.store.get_topology(&version.topology_id).await?;

        let mut by_id = BTreeMap::new();
        for location_id in builder.location_ids() {
            let location = self.store.get_location(location_id).await?;
            self.authorizer.check_location(&location, DEPLOYER_ROLES)?;
            by_id.insert(location.id.clone(), location);
        }

        let id = generate_id(&version.id, &environment.id);
        let mut derived = match self.store.find_deployment_topology(&id).await? {
            Some(existing) => {
                let choices = existing.substituted_nodes.clone();
                let mut fresh = existing.reset(&topology.id);
                fresh.substituted_nodes = choices;
                fresh
            }
            None => DeploymentTopology::new(&environment, &topology.id),
        };
        derived.orchestrator_id = Some(orchestrator_id.to_string());
        builder.apply(&mut derived, &by_id)?;

        let locations = derived
            .location_ids()
            .into_iter()
            .filter_map(|(group, location_id)| by_id.get(&location_id).map(|l| (group, l.clone())))
            .collect();
        info!(
            "Placing '{}' on {:?} with orchestrator '{}'",
            derived.id,
            derived.location_ids(),
            orchestrator_id
        );

        let sources = self.load_sources(&derived, topology, locations).await?;
        let (deployment_topology, availability) = self.regenerate_and_save(derived, &sources).await?;
        Ok(DeploymentConfiguration {
            deployment_topology,
            availability,
        })
    }

    /// Override a property of a substituted node.
    ///
    /// The value is validated against the bound resource's type and written to
    /// the resource template, then mirrored on the node. Inputs are re-resolved;
    /// substitution is not re-run.
    pub async fn update_substitution_property(
        &self,
        derived: &mut DeploymentTopology,
        node_id: &str,
        property: &str,
        value: Option<PropertyValue>,
    ) -> Result<()> {
        let (mut resource, resource_type) = self.bound_resource(derived, node_id).await?;

        let mut working = derived.clone();
        set_node_property(&mut working, node_id, &mut resource, &resource_type, property, value)?;
        info!("Set '{}' of '{}' through resource '{}'", property, node_id, resource.id);

        self.save_override(derived, working, resource).await
    }

    /// Override a capability property of a substituted node.
    pub async fn update_substitution_capability_property(
        &self,
        derived: &mut DeploymentTopology,
        node_id: &str,
        capability: &str,
        property: &str,
        value: Option<PropertyValue>,
    ) -> Result<()> {
        let (mut resource, resource_type) = self.bound_resource(derived, node_id).await?;

        let mut working = derived.clone();
        set_capability_property(
            &mut working,
            node_id,
            &mut resource,
            &resource_type,
            capability,
            property,
            value,
        )?;
        info!(
            "Set '{}.{}' of '{}' through resource '{}'",
            capability, property, node_id, resource.id
        );

        self.save_override(derived, working, resource).await
    }

    /// Bind a node to another of its candidate resources.
    pub async fn update_substitution(
        &self,
        derived: &mut DeploymentTopology,
        node_id: &str,
        resource_id: &str,
    ) -> Result<()> {
        let locations = self.get_locations(derived).await?;
        let topology = self.store.get_topology(&derived.initial_topology_id).await?;
        let sources = self.load_sources(derived, topology, locations).await?;
        let availability = self.availability(derived, &sources);

        let candidates = availability
            .available_substitutions
            .get(node_id)
            .ok_or_else(|| TopologyError::not_found(EntityKind::Node, node_id))?;
        if !candidates.contains(resource_id) {
            return Err(TopologyError::not_found(EntityKind::ResourceTemplate, resource_id).into());
        }
        let resource = availability
            .substitution_templates
            .get(resource_id)
            .ok_or_else(|| TopologyError::not_found(EntityKind::ResourceTemplate, resource_id))?;

        let mut working = derived.clone();
        bind(&mut working, node_id, resource)?;
        info!("Substituting '{}' by '{}' on request", node_id, resource_id);

        self.refresh_inputs(
            &mut working,
            &sources.topology,
            sources.orchestrator.as_ref(),
            &availability.substitution_templates,
        )
        .await?;
        *derived = self.store.save_deployment_topology(&working).await?;
        Ok(())
    }

    /// Set deployment input values of an environment.
    ///
    /// `None` removes the user's value so the declared default applies again.
    pub async fn set_input_properties(
        &self,
        environment_id: &str,
        values: BTreeMap<String, Option<PropertyValue>>,
    ) -> Result<DeploymentConfiguration> {
        let (derived, sources) = self.get_or_create(environment_id).await?;
        let declared = &sources.topology.template.inputs;

        let mut working = derived.clone();
        for (name, value) in values {
            let definition = declared
                .get(&name)
                .ok_or_else(|| TopologyError::not_found(EntityKind::Input, &name))?;
            validate_value(&name, definition, value.as_ref())?;
            match value {
                Some(value) => {
                    working.input_properties.insert(name, Some(value));
                }
                None => {
                    working.input_properties.remove(&name);
                }
            }
        }

        self.refresh_inputs(
            &mut working,
            &sources.topology,
            sources.orchestrator.as_ref(),
            &BTreeMap::new(),
        )
        .await?;
        let saved = self.store.save_deployment_topology(&working).await?;
        info!("Updated inputs of '{}' (revision {})", saved.id, saved.revision);

        let availability = self.availability(&saved, &sources);
        Ok(DeploymentConfiguration {
            deployment_topology: saved,
            availability,
        })
    }

    /// Provide the environment's file for one of the topology's input artifacts.
    pub async fn update_input_artifact(
        &self,
        derived: &mut DeploymentTopology,
        name: &str,
        artifact: DeploymentArtifact,
    ) -> Result<()> {
        if !derived.template.input_artifacts.contains_key(name) {
            return Err(TopologyError::not_found(EntityKind::Input, name).into());
        }

        let topology = self.store.get_topology(&derived.initial_topology_id).await?;
        let orchestrator = self.find_orchestrator(derived).await?;

        let mut working = derived.clone();
        working.uploaded_input_artifacts.insert(name.to_string(), artifact);
        self.refresh_inputs(&mut working, &topology, orchestrator.as_ref(), &BTreeMap::new())
            .await?;

        *derived = self.store.save_deployment_topology(&working).await?;
        Ok(())
    }

    pub async fn get_or_fail(&self, id: &str) -> Result<DeploymentTopology> {
        self.store
            .find_deployment_topology(id)
            .await?
            .ok_or_else(|| TopologyError::not_found(EntityKind::DeploymentTopology, id).into())
    }

    /// Deployment topologies of every environment running a version of the topology.
    ///
    /// Each one is created or synchronized first, as on a direct read.
    pub async fn list_by_topology_id(&self, topology_id: &str) -> Result<Vec<DeploymentTopology>> {
        let mut found = Vec::new();
        for version in self.store.find_versions_by_topology(topology_id).await? {
            for environment in self.store.find_environments_by_version(&version.id).await? {
                let (derived, _) = self.get_or_create(&environment.id).await?;
                found.push(derived);
            }
        }
        Ok(found)
    }

    /// Delete the deployment topologies of an environment.
    pub async fn delete_by_environment_id(&self, environment_id: &str) -> Result<usize> {
        let removed = self.store.delete_deployment_topologies_by_environment(environment_id).await?;
        info!("Deleted {} deployment topologies of '{}'", removed, environment_id);
        Ok(removed)
    }

    /// The deployment topology as handed to deployment planning.
    ///
    /// Unresolved `get_input` references become explicit nulls and the location
    /// dependencies join the template's. Nothing is saved.
    #[must_use]
    pub fn finalize_for_deployment(&self, derived: &DeploymentTopology) -> DeploymentTopology {
        let mut finalized = derived.clone();
        finalized.template.dependencies = finalized.all_dependencies();
        let replaced = finalize(&mut finalized);
        debug!("Finalized '{}': {} unresolved inputs set to null", finalized.id, replaced);
        finalized
    }

    /// Placement locations of a deployment topology, keyed by group.
    ///
    /// Fails when the deployment topology is not placed or a location is gone.
    pub async fn get_locations(
        &self,
        derived: &DeploymentTopology,
    ) -> Result<BTreeMap<String, Location>> {
        let location_ids = derived.location_ids();
        if location_ids.is_empty() {
            return Err(TopologyError::not_found(
                EntityKind::Location,
                format!("placement of {}", derived.id),
            )
            .into());
        }

        let ids: BTreeSet<String> = location_ids.values().cloned().collect();
        let found = self.store.find_locations(&ids).await?;
        match resolve_locations(&location_ids, &found) {
            LocationResolution::Resolved(locations) => Ok(locations),
            LocationResolution::Invalid {
                missing,
            } => Err(TopologyError::not_found(EntityKind::Location, missing.join(", ")).into()),
        }
    }

    async fn get_or_create(&self, environment_id: &str) -> Result<(DeploymentTopology, Sources)> {
        let environment = self.store.get_environment(environment_id).await?;
        let version = self.store.get_version(&environment.current_version_id).await?;
        let topology = self.store.get_topology(&version.topology_id).await?;
        let id = generate_id(&version.id, &environment.id);

        let Some(existing) = self.store.find_deployment_topology(&id).await? else {
            info!("Creating deployment topology '{}' from '{}'", id, topology.id);
            let derived = DeploymentTopology::new(&environment, &topology.id);
            let sources = self.load_sources(&derived, topology, BTreeMap::new()).await?;
            let (derived, _) = self.regenerate_and_save(derived, &sources).await?;
            return Ok((derived, sources));
        };

        let location_ids = existing.location_ids();
        let ids: BTreeSet<String> = location_ids.values().cloned().collect();
        let found = self.store.find_locations(&ids).await?;

        match resolve_locations(&location_ids, &found) {
            LocationResolution::Invalid {
                missing,
            } => {
                warn!(
                    "Locations {:?} of '{}' no longer exist, regenerating from scratch",
                    missing, existing.id
                );
                let derived = existing.reset(&topology.id);
                let sources = self.load_sources(&derived, topology, BTreeMap::new()).await?;
                let (derived, _) = self.regenerate_and_save(derived, &sources).await?;
                Ok((derived, sources))
            }
            LocationResolution::Resolved(locations) => {
                let reason = check_staleness(&existing, &topology, &locations);
                let sources = self.load_sources(&existing, topology, locations).await?;
                match reason {
                    Some(reason) => {
                        info!("Deployment topology '{}' is stale: {}", existing.id, reason);
                        let (derived, _) = self.regenerate_and_save(existing, &sources).await?;
                        Ok((derived, sources))
                    }
                    None => {
                        debug!("Deployment topology '{}' is up to date", existing.id);
                        Ok((existing, sources))
                    }
                }
            }
        }
    }

    async fn load_sources(
        &self,
        derived: &DeploymentTopology,
        topology: Topology,
        locations: BTreeMap<String, Location>,
    ) -> Result<Sources> {
        let location_ids: BTreeSet<&str> = locations.values().map(|l| l.id.as_str()).collect();
        let offered = try_join_all(location_ids.iter().map(|id| self.store.location_resources(id)))
            .await?;
        let resources: BTreeMap<String, LocationResources> =
            location_ids.into_iter().map(str::to_string).zip(offered).collect();

        let mut type_ids = derived.original_node_types();
        type_ids.extend(topology.template.node_templates.values().map(|n| n.node_type.clone()));
        let node_types = self.store.find_node_types(&type_ids).await?;
        let orchestrator = self.find_orchestrator(derived).await?;

        Ok(Sources {
            topology,
            locations,
            resources,
            node_types,
            orchestrator,
        })
    }

    async fn find_orchestrator(&self, derived: &DeploymentTopology) -> Result<Option<Orchestrator>> {
        let Some(orchestrator_id) = &derived.orchestrator_id else {
            return Ok(None);
        };
        let orchestrator = self.store.find_orchestrator(orchestrator_id).await?;
        if orchestrator.is_none() {
            warn!(
                "Orchestrator '{}' of '{}' not found, keeping deployment properties as they are",
                orchestrator_id, derived.id
            );
        }
        Ok(orchestrator)
    }

    fn availability(&self, derived: &DeploymentTopology, sources: &Sources) -> SubstitutionSnapshot {
        resolve_available(derived, sources.substitution_inputs(), self.matcher.as_ref())
    }

    async fn regenerate_and_save(
        &self,
        derived: DeploymentTopology,
        sources: &Sources,
    ) -> Result<(DeploymentTopology, SubstitutionSnapshot)> {
        let ctx = GenerationContext {
            source: &sources.topology,
            locations: &sources.locations,
            resources: &sources.resources,
            node_types: &sources.node_types,
            orchestrator: sources.orchestrator.as_ref(),
            composer: self.composer.as_ref(),
            matcher: self.matcher.as_ref(),
        };
        let before = derived.fingerprint()?;
        let (derived, snapshot) = regenerate(derived, &ctx)?;
        if derived.fingerprint()? == before {
            debug!("Regenerated '{}' without content changes", derived.id);
        }

        let saved = self.store.save_deployment_topology(&derived).await?;
        info!(
            "Saved deployment topology '{}' (revision {}, {} substitutions)",
            saved.id,
            saved.revision,
            saved.substituted_nodes.len()
        );
        Ok((saved, snapshot))
    }

    async fn bound_resource(
        &self,
        derived: &DeploymentTopology,
        node_id: &str,
    ) -> Result<(LocationResourceTemplate, NodeType)> {
        let resource_id = bound_resource_id(derived, node_id)?;
        let resource = self.store.get_resource_template(resource_id).await?;
        let resource_type = self.store.get_node_type(resource.node_type()).await?;
        Ok((resource, resource_type))
    }

    async fn save_override(
        &self,
        derived: &mut DeploymentTopology,
        mut working: DeploymentTopology,
        resource: LocationResourceTemplate,
    ) -> Result<()> {
        let topology = self.store.get_topology(&working.initial_topology_id).await?;
        let orchestrator = self.find_orchestrator(&working).await?;
        let known = BTreeMap::from([(resource.id.clone(), resource)]);
        self.refresh_inputs(&mut working, &topology, orchestrator.as_ref(), &known).await?;

        for resource in known.values() {
            self.store.save_resource_template(resource).await?;
            self.touch_location(&mut working, &resource.location_id).await?;
        }
        *derived = self.store.save_deployment_topology(&working).await?;
        Ok(())
    }

    /// Advance a location's `last_modified` after one of its resources changed.
    ///
    /// Every deployment topology placed there becomes stale and re-mirrors the
    /// resource on its next read. `working` moves its location watermark along
    /// when it had seen the previous location state, since it already mirrors
    /// the change.
    async fn touch_location(
        &self,
        working: &mut DeploymentTopology,
        location_id: &str,
    ) -> Result<()> {
        let Some(mut location) = self.store.find_location(location_id).await? else {
            warn!("Location '{}' of an updated resource not found", location_id);
            return Ok(());
        };
        let previous = location.last_modified;
        location.last_modified = Utc::now().max(previous + Duration::milliseconds(1));
        self.store.save_location(&location).await?;
        debug!("Location '{}' modified at {}", location.id, location.last_modified);

        let seen = working.location_sync_timestamp.max(working.last_sync_timestamp);
        let placed_here = working.location_ids().values().any(|id| id == location_id);
        if placed_here && seen.is_some_and(|seen| seen >= previous) {
            working.location_sync_timestamp = Some(location.last_modified);
        }
        Ok(())
    }

    /// Re-run the input steps, then restore the mirrored resource values.
    ///
    /// Bound resources missing from `known` are read from the store.
    async fn refresh_inputs(
        &self,
        working: &mut DeploymentTopology,
        topology: &Topology,
        orchestrator: Option<&Orchestrator>,
        known: &BTreeMap<String, LocationResourceTemplate>,
    ) -> Result<()> {
        apply_input_steps(working, topology, orchestrator);

        let mut templates = BTreeMap::new();
        for resource_id in working.substituted_nodes.values() {
            if templates.contains_key(resource_id) {
                continue;
            }
            let template = match known.get(resource_id) {
                Some(template) => template.clone(),
                None => self.store.get_resource_template(resource_id).await?,
            };
            templates.insert(resource_id.clone(), template);
        }
        mirror_bound_templates(working, &templates)?;
        Ok(())
    }
}
