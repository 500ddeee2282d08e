//! Property overrides on substituted nodes.
//!
//! A substituted node shows its resource's values, so an override is written
//! onto the bound location resource template first and the resulting value is
//! then copied back onto the node. Validation happens before either write.

use super::DeploymentTopology;
use crate::core::{EntityKind, TopologyError};
use crate::models::{Capability, LocationResourceTemplate, NodeType, PropertyValue};
use crate::validation::{set_template_capability_property, set_template_property};

/// The resource template id a node is bound to.
///
/// Fails when the deployment topology has no binding at all, or none for `node_id`.
pub fn bound_resource_id<'a>(
    derived: &'a DeploymentTopology,
    node_id: &str,
) -> Result<&'a str, TopologyError> {
    if derived.substituted_nodes.is_empty() {
        return Err(TopologyError::NoSubstitutions);
    }
    derived.substituted_nodes.get(node_id).map(String::as_str).ok_or_else(|| {
        TopologyError::SubstitutionNotFound {
            node: node_id.to_string(),
        }
    })
}

fn ensure_bound(
    derived: &DeploymentTopology,
    node_id: &str,
    resource: &LocationResourceTemplate,
) -> Result<(), TopologyError> {
    let bound = bound_resource_id(derived, node_id)?;
    if bound != resource.id {
        return Err(TopologyError::InvalidArgument {
            reason: format!(
                "Node '{node_id}' is bound to '{bound}', not to '{}'",
                resource.id
            ),
        });
    }
    if !derived.template.node_templates.contains_key(node_id) {
        return Err(TopologyError::not_found(EntityKind::Node, node_id));
    }
    Ok(())
}

/// Override a property of a substituted node.
///
/// `resource` is the node's bound resource template and `resource_type` its
/// node type. On error neither is modified.
pub fn set_node_property(
    derived: &mut DeploymentTopology,
    node_id: &str,
    resource: &mut LocationResourceTemplate,
    resource_type: &NodeType,
    property: &str,
    value: Option<PropertyValue>,
) -> Result<(), TopologyError> {
    ensure_bound(derived, node_id, resource)?;
    set_template_property(resource, resource_type, property, value)?;

    let mirrored = resource.template.properties.get(property).cloned().flatten();
    if let Some(node) = derived.template.node_templates.get_mut(node_id) {
        node.properties.insert(property.to_string(), mirrored);
    }
    Ok(())
}

/// Override a capability property of a substituted node.
///
/// The capability is added to the node when it has none yet.
pub fn set_capability_property(
    derived: &mut DeploymentTopology,
    node_id: &str,
    resource: &mut LocationResourceTemplate,
    resource_type: &NodeType,
    capability: &str,
    property: &str,
    value: Option<PropertyValue>,
) -> Result<(), TopologyError> {
    ensure_bound(derived, node_id, resource)?;
    set_template_capability_property(resource, resource_type, capability, property, value)?;

    let Some(resource_capability) = resource.template.capabilities.get(capability) else {
        return Err(TopologyError::not_found(EntityKind::Capability, capability));
    };
    let mirrored = resource_capability.properties.get(property).cloned().flatten();

    if let Some(node) = derived.template.node_templates.get_mut(node_id) {
        node.capabilities
            .entry(capability.to_string())
            .or_insert_with(|| Capability::new(&resource_capability.capability_type))
            .properties
            .insert(property.to_string(), mirrored);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::substitution::bind;
    use crate::models::{
        ApplicationEnvironment, CapabilityDefinition, NodeTemplate, PropertyConstraint,
        PropertyDefinition, PropertyType,
    };

    fn scalar(s: &str) -> Option<PropertyValue> {
        Some(PropertyValue::scalar(s))
    }

    fn resource_type() -> NodeType {
        NodeType::new("aws.Compute")
            .with_property(
                "size",
                PropertyDefinition::string().with_constraint(PropertyConstraint::ValidValues(
                    vec!["S".into(), "M".into(), "L".into()],
                )),
            )
            .with_capability(
                "scalable",
                CapabilityDefinition {
                    capability_type: "Scalable".into(),
                    properties: [(
                        "max".to_string(),
                        PropertyDefinition::of_type(PropertyType::Integer),
                    )]
                    .into_iter()
                    .collect(),
                },
            )
    }

    fn bound() -> (DeploymentTopology, LocationResourceTemplate) {
        let mut derived =
            DeploymentTopology::new(&ApplicationEnvironment::new("prod", "shop", "v1"), "topo");
        derived
            .template
            .node_templates
            .insert("server".into(), NodeTemplate::new("tosca.nodes.Compute"));
        let resource = LocationResourceTemplate::new(
            "medium",
            "aws",
            NodeTemplate::new("aws.Compute").with_property("size", scalar("M")),
        );
        bind(&mut derived, "server", &resource).unwrap();
        (derived, resource)
    }

    #[test]
    fn test_set_node_property_round_trip() {
        let (mut derived, mut resource) = bound();

        set_node_property(&mut derived, "server", &mut resource, &resource_type(), "size", scalar("L"))
            .unwrap();

        assert_eq!(resource.template.properties["size"], scalar("L"));
        assert_eq!(derived.template.node_templates["server"].properties["size"], scalar("L"));
    }

    #[test]
    fn test_set_node_property_rejected_value_changes_nothing() {
        let (mut derived, mut resource) = bound();
        let (before_derived, before_resource) = (derived.clone(), resource.clone());

        let err = set_node_property(
            &mut derived,
            "server",
            &mut resource,
            &resource_type(),
            "size",
            scalar("XL"),
        )
        .unwrap_err();

        assert!(matches!(err, TopologyError::ConstraintViolation { .. }));
        assert_eq!(derived, before_derived);
        assert_eq!(resource, before_resource);
    }

    #[test]
    fn test_unbound_node() {
        let (mut derived, mut resource) = bound();
        derived.template.node_templates.insert("db".into(), NodeTemplate::new("Db"));

        let err = set_node_property(&mut derived, "db", &mut resource, &resource_type(), "size", scalar("L"))
            .unwrap_err();
        assert!(matches!(err, TopologyError::SubstitutionNotFound { ref node } if node == "db"));

        derived.substituted_nodes.clear();
        assert!(matches!(bound_resource_id(&derived, "server"), Err(TopologyError::NoSubstitutions)));
    }

    #[test]
    fn test_set_capability_property_creates_node_capability() {
        let (mut derived, mut resource) = bound();

        set_capability_property(
            &mut derived,
            "server",
            &mut resource,
            &resource_type(),
            "scalable",
            "max",
            scalar("4"),
        )
        .unwrap();

        assert_eq!(resource.template.capabilities["scalable"].properties["max"], scalar("4"));
        let node_capability = &derived.template.node_templates["server"].capabilities["scalable"];
        assert_eq!(node_capability.capability_type, "Scalable");
        assert_eq!(node_capability.properties["max"], scalar("4"));
    }
}
