//! Pluggable collaborators of the synchronization engine.
//!
//! The engine delegates three decisions it does not own:
//!
//! - [`Authorizer`]: may the caller deploy onto a location?
//! - [`SubstitutionMatcher`]: which nodes need a location resource, and which
//!   resources can stand in for them?
//! - [`CompositionProcessor`]: inlining of composed sub-topologies.
//!
//! Each comes with the implementation the CLI uses by default.

use std::collections::BTreeSet;

use crate::core::TopologyError;
use crate::models::{Location, LocationResourceTemplate, NodeTemplate, NodeType, TopologyTemplate};

/// Checks that the caller holds one of a set of roles on a location.
pub trait Authorizer: Send + Sync {
    fn check_location(&self, location: &Location, roles: &[&str]) -> Result<(), TopologyError>;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn check_location(&self, _location: &Location, _roles: &[&str]) -> Result<(), TopologyError> {
        Ok(())
    }
}

/// Authorizes a user by the roles a location grants to them or to one of their groups.
#[derive(Debug, Clone)]
pub struct RoleAuthorizer {
    user: String,
    groups: BTreeSet<String>,
}

impl RoleAuthorizer {
    pub fn new(user: impl Into<String>, groups: impl IntoIterator<Item = String>) -> Self {
        Self {
            user: user.into(),
            groups: groups.into_iter().collect(),
        }
    }
}

impl Authorizer for RoleAuthorizer {
    fn check_location(&self, location: &Location, roles: &[&str]) -> Result<(), TopologyError> {
        let grants = |granted: Option<&BTreeSet<String>>| {
            granted.is_some_and(|granted| roles.iter().any(|role| granted.contains(*role)))
        };

        let allowed = grants(location.user_roles.get(&self.user))
            || self.groups.iter().any(|group| grants(location.group_roles.get(group)));

        if allowed {
            Ok(())
        } else {
            Err(TopologyError::Unauthorized {
                location: location.id.clone(),
                roles: roles.join(", "),
            })
        }
    }
}

/// Decides substitutability and candidate compatibility.
pub trait SubstitutionMatcher: Send + Sync {
    /// Whether `node` must be bound to a location resource to be deployed.
    fn is_substitutable(&self, node: &NodeTemplate, node_type: Option<&NodeType>) -> bool;

    /// Whether `resource` can stand in for `node`.
    fn is_candidate(
        &self,
        node: &NodeTemplate,
        resource: &LocationResourceTemplate,
        resource_type: Option<&NodeType>,
    ) -> bool;
}

/// Matches abstract nodes against enabled resources of the same or a derived type.
///
/// A resource must also offer every capability the node declares.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeHierarchyMatcher;

impl SubstitutionMatcher for TypeHierarchyMatcher {
    fn is_substitutable(&self, _node: &NodeTemplate, node_type: Option<&NodeType>) -> bool {
        node_type.is_some_and(|t| t.is_abstract)
    }

    fn is_candidate(
        &self,
        node: &NodeTemplate,
        resource: &LocationResourceTemplate,
        resource_type: Option<&NodeType>,
    ) -> bool {
        if !resource.enabled {
            return false;
        }

        let type_matches = resource.node_type() == node.node_type
            || resource_type.is_some_and(|t| t.is_a(&node.node_type));
        if !type_matches {
            return false;
        }

        node.capabilities.keys().all(|capability| {
            resource.template.capabilities.contains_key(capability)
                || resource_type.is_some_and(|t| t.capabilities.contains_key(capability))
        })
    }
}

/// Inlines composed sub-topologies into a topology template.
pub trait CompositionProcessor: Send + Sync {
    fn process(&self, template: &mut TopologyTemplate) -> anyhow::Result<()>;
}

/// Leaves templates untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoComposition;

impl CompositionProcessor for NoComposition {
    fn process(&self, _template: &mut TopologyTemplate) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEPLOYER_ROLES;
    use crate::models::Capability;
    use chrono::Utc;

    fn location() -> Location {
        let mut location = Location::new("aws", "cloudify", Utc::now());
        location.user_roles.insert("alice".into(), ["DEPLOYER".to_string()].into());
        location.group_roles.insert("ops".into(), ["ADMIN".to_string()].into());
        location
    }

    #[test]
    fn test_role_authorizer() {
        let location = location();

        assert!(RoleAuthorizer::new("alice", []).check_location(&location, DEPLOYER_ROLES).is_ok());
        assert!(
            RoleAuthorizer::new("bob", ["ops".to_string()])
                .check_location(&location, DEPLOYER_ROLES)
                .is_ok()
        );

        let err = RoleAuthorizer::new("bob", ["dev".to_string()])
            .check_location(&location, DEPLOYER_ROLES)
            .unwrap_err();
        assert!(matches!(err, TopologyError::Unauthorized { ref location, .. } if location == "aws"));
    }

    #[test]
    fn test_type_hierarchy_matcher() {
        let matcher = TypeHierarchyMatcher;
        let abstract_compute = NodeType::new("tosca.nodes.Compute").abstract_type();
        let node = NodeTemplate::new("tosca.nodes.Compute")
            .with_capability("host", Capability::new("tosca.capabilities.Container"));

        assert!(matcher.is_substitutable(&node, Some(&abstract_compute)));
        assert!(!matcher.is_substitutable(&node, None));

        let aws_type = NodeType::new("aws.Compute").derived_from("tosca.nodes.Compute");
        let with_host = LocationResourceTemplate::new(
            "small",
            "aws",
            NodeTemplate::new("aws.Compute")
                .with_capability("host", Capability::new("tosca.capabilities.Container")),
        );
        assert!(matcher.is_candidate(&node, &with_host, Some(&aws_type)));
        assert!(!matcher.is_candidate(&node, &with_host, None));

        let without_host =
            LocationResourceTemplate::new("tiny", "aws", NodeTemplate::new("aws.Compute"));
        assert!(!matcher.is_candidate(&node, &without_host, Some(&aws_type)));

        let mut disabled = with_host.clone();
        disabled.enabled = false;
        assert!(!matcher.is_candidate(&node, &disabled, Some(&aws_type)));
    }
}
