//! Placement of node groups on locations.
//!
//! Placement is a mapping from group name to location id. Only one group is
//! supported today: every node belongs to the implicit [`GROUP_ALL`] group,
//! whatever name the caller used. [`LocationPolicyBuilder`] enforces that
//! cardinality, so the data model does not need to change once several groups
//! are allowed.

use std::collections::BTreeMap;

use super::DeploymentTopology;
use crate::constants::{GROUP_ALL, LOCATION_POLICY_NAME};
use crate::core::{EntityKind, TopologyError};
use crate::models::{Location, NodeGroup, Policy};

/// Number of placement groups accepted by [`LocationPolicyBuilder`].
pub const MAX_LOCATION_GROUPS: usize = 1;

/// Collects (group, location) pairs up to [`MAX_LOCATION_GROUPS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationPolicyBuilder {
    placements: BTreeMap<String, String>,
}

impl LocationPolicyBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a group to location mapping, rejecting too many groups.
    pub fn from_mapping(mapping: &BTreeMap<String, String>) -> Result<Self, TopologyError> {
        mapping
            .iter()
            .try_fold(Self::new(), |builder, (group, location)| builder.place(group, location))
    }

    /// Place a group on a location.
    pub fn place(
        mut self,
        group: impl Into<String>,
        location_id: impl Into<String>,
    ) -> Result<Self, TopologyError> {
        let group = group.into();
        if !self.placements.contains_key(&group) && self.placements.len() >= MAX_LOCATION_GROUPS {
            return Err(TopologyError::UnsupportedOperation {
                reason: "Multiple Location policies not yet supported".to_string(),
            });
        }
        self.placements.insert(group, location_id.into());
        Ok(self)
    }

    /// Location ids to resolve before [`Self::apply`].
    pub fn location_ids(&self) -> impl Iterator<Item = &str> {
        self.placements.values().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Attach placement policies and location dependencies to `derived`.
    ///
    /// `locations` is keyed by location id. The group keeps a single placement
    /// policy, replacing any earlier one.
    pub fn apply(
        self,
        derived: &mut DeploymentTopology,
        locations: &BTreeMap<String, Location>,
    ) -> Result<(), TopologyError> {
        for location_id in self.placements.into_values() {
            let location = locations
                .get(&location_id)
                .ok_or_else(|| TopologyError::not_found(EntityKind::Location, &location_id))?;
            derived.location_dependencies.extend(location.dependencies.iter().cloned());

            let mut group = NodeGroup::new(GROUP_ALL);
            group.policies.push(Policy::LocationPlacement {
                name: LOCATION_POLICY_NAME.to_string(),
                location_id,
            });
            derived.location_groups.insert(GROUP_ALL.to_string(), group);
        }
        Ok(())
    }
}
