//! Data models shared by the engine, the stores and the CLI.
//!
//! - [`property`]: property values and definitions
//! - [`topology`]: source topologies and their node templates
//! - [`location`]: locations, their resource templates and node types
//! - [`application`]: application environments and versions

pub mod application;
pub mod location;
pub mod property;
pub mod topology;

pub use application::{ApplicationEnvironment, ApplicationVersion};
pub use location::{
    CapabilityDefinition, Location, LocationResourceTemplate, LocationResources, NodeType,
    Orchestrator,
};
pub use property::{
    PropertyConstraint, PropertyDefinition, PropertyMap, PropertyType, PropertyValue,
    default_properties,
};
pub use topology::{
    Capability, CsarDependency, DeploymentArtifact, NodeGroup, NodeTemplate, Policy,
    RelationshipTemplate, Topology, TopologyTemplate,
};
