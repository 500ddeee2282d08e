//! Application environments and versions.
//!
//! An environment deploys one version of an application at a time. The
//! version points at the source topology that deployment topologies are
//! derived from.

use serde::{Deserialize, Serialize};

/// A deployment target of an application (for example `dev` or `prod`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEnvironment {
    pub id: String,
    pub application_id: String,
    pub name: String,

    /// The application version currently deployed to this environment.
    pub current_version_id: String,
}

impl ApplicationEnvironment {
    pub fn new(
        id: impl Into<String>,
        application_id: impl Into<String>,
        current_version_id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            application_id: application_id.into(),
            current_version_id: current_version_id.into(),
        }
    }
}

/// A version of an application, bound to one source topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationVersion {
    pub id: String,
    pub application_id: String,
    pub version: String,
    pub topology_id: String,
}

impl ApplicationVersion {
    pub fn new(
        id: impl Into<String>,
        application_id: impl Into<String>,
        topology_id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            version: id.clone(),
            id,
            application_id: application_id.into(),
            topology_id: topology_id.into(),
        }
    }
}
