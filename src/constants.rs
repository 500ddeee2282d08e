//! Constants shared across the engine.
//!
//! Group names, policy names, role names and the on-disk store layout are defined
//! here so that the façade, the CLI and the stores agree on them.

/// Name of the implicit group that contains every node of a topology.
///
/// Placement policies are attached to this group only; multi-group placement is
/// rejected by the location policy assigner.
pub const GROUP_ALL: &str = "ALL";

/// Display name given to generated location placement policies.
pub const LOCATION_POLICY_NAME: &str = "Location policy";

/// Prefix of deployment topology identifiers (`deployment-{version}-{environment}`).
pub const DEPLOYMENT_ID_PREFIX: &str = "deployment";

/// Roles accepted as deployer-class authorization on a location.
pub const DEPLOYER_ROLES: &[&str] = &["DEPLOYER", "ADMIN"];

/// Environment variable naming an alternate configuration file.
pub const CONFIG_ENV_VAR: &str = "TOPO_SYNC_CONFIG";

/// Default store directory, relative to the working directory.
pub const DEFAULT_STORE_DIR: &str = ".topo-sync";

/// Collection directory names used by the file store.
pub mod collections {
    pub const TOPOLOGIES: &str = "topologies";
    pub const VERSIONS: &str = "versions";
    pub const ENVIRONMENTS: &str = "environments";
    pub const LOCATIONS: &str = "locations";
    pub const RESOURCES: &str = "resources";
    pub const TYPES: &str = "types";
    pub const ORCHESTRATORS: &str = "orchestrators";
    pub const DEPLOYMENT_TOPOLOGIES: &str = "deployment-topologies";
    pub const LOCKS: &str = ".locks";
}
