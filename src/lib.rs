//! topology-sync: deployment topology synchronization and substitution.
//!
//! An application topology is written once, independent of where it runs. To
//! deploy it, each (application version, environment) pair gets its own
//! *deployment topology*: a copy of the source placed on a location, with its
//! abstract nodes substituted by concrete resources that the location offers.
//!
//! This crate keeps those deployment topologies synchronized:
//!
//! - it creates them lazily and regenerates them when the source topology or a
//!   placement location changes
//! - it resolves which location resources can stand in for each abstract node
//!   and keeps the substituted nodes mirroring their resources
//! - it resolves deployment inputs, input artifacts and orchestrator properties
//! - it propagates property overrides of substituted nodes to the resources
//!
//! # Architecture
//!
//! - [`deployment`]: deployment topologies and the [`DeploymentTopologyService`]
//! - [`store`]: repository traits with in-memory and file implementations
//! - [`models`]: topologies, locations, applications, property values
//! - [`collaborators`]: authorization, substitution matching and composition seams
//! - [`validation`]: property type and constraint checks
//! - [`config`]: the TOML configuration
//! - [`cli`]: the `topo-sync` command line
//!
//! # Example
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use topology_sync::deployment::DeploymentTopologyService;
//! use topology_sync::store::FileStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = DeploymentTopologyService::new(Arc::new(FileStore::new(".topo-sync")));
//!
//! let placement = BTreeMap::from([("ALL".to_string(), "aws".to_string())]);
//! let configuration = service.set_location_policies("prod", "cloudify", &placement).await?;
//!
//! let mut derived = configuration.deployment_topology;
//! let size = Some(topology_sync::models::PropertyValue::scalar("L"));
//! service.update_substitution_property(&mut derived, "server", "size", size).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`DeploymentTopologyService`]: deployment::DeploymentTopologyService

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod core;
pub mod deployment;
pub mod models;
pub mod store;
pub mod utils;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
