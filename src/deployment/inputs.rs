//! Deployment inputs.
//!
//! Input processing runs in a fixed order whenever a deployment topology is
//! regenerated or its inputs change:
//!
//! 1. [`process_input_properties`]: effective input values from user values and defaults
//! 2. [`resolve_get_inputs`]: `get_input` references of the source replaced by input values
//! 3. [`process_input_artifacts`]: input-bound node artifacts pointed at uploaded files
//! 4. [`process_provider_deployment_properties`]: orchestrator properties defaulted and pruned
//!
//! [`finalize`] is the terminal step before deployment planning.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::DeploymentTopology;
use crate::models::{Orchestrator, PropertyMap, PropertyValue, Topology};
use crate::validation::validate_value;

/// Run the four input steps in order.
pub fn apply_input_steps(
    derived: &mut DeploymentTopology,
    source: &Topology,
    orchestrator: Option<&Orchestrator>,
) {
    process_input_properties(derived);
    resolve_get_inputs(derived, source);
    process_input_artifacts(derived);
    process_provider_deployment_properties(derived, orchestrator);
}

/// Recompute the effective input values.
///
/// Every declared input takes the user's value when it still validates against
/// the declaration, otherwise the declared default. Values for inputs that are no
/// longer declared are dropped, as are inputs without any value.
pub fn process_input_properties(derived: &mut DeploymentTopology) {
    let mut current = std::mem::take(&mut derived.input_properties);
    let mut processed = PropertyMap::new();

    for (name, definition) in &derived.template.inputs {
        let user_value = current.remove(name).flatten().filter(|value| {
            match validate_value(name, definition, Some(value)) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Dropping input '{}': {}", name, e);
                    false
                }
            }
        });

        if let Some(value) = user_value.or_else(|| definition.default_value()) {
            processed.insert(name.clone(), Some(value));
        }
    }

    for name in current.keys() {
        debug!("Dropping value of undeclared input '{}'", name);
    }

    derived.input_properties = processed;
}

/// The value a `get_input` reference resolves to, or the reference itself.
fn resolve(inputs: &PropertyMap, input: &str) -> Option<PropertyValue> {
    match inputs.get(input) {
        Some(Some(value)) => Some(value.clone()),
        _ => Some(PropertyValue::get_input(input)),
    }
}

fn resolve_into(source: &PropertyMap, target: &mut PropertyMap, inputs: &PropertyMap) {
    for (name, value) in source {
        if let Some(input) = value.as_ref().and_then(PropertyValue::input_reference) {
            target.insert(name.clone(), resolve(inputs, input));
        }
    }
}

/// Resolve the `get_input` references of the source topology onto `derived`.
///
/// References are read from the source so that a value resolved earlier is
/// re-resolved when the input changes. An input without value leaves the
/// reference in place until [`finalize`].
pub fn resolve_get_inputs(derived: &mut DeploymentTopology, source: &Topology) {
    let inputs = &derived.input_properties;

    for (node_id, source_node) in &source.template.node_templates {
        let Some(node) = derived.template.node_templates.get_mut(node_id) else {
            continue;
        };

        resolve_into(&source_node.properties, &mut node.properties, inputs);

        for (name, source_capability) in &source_node.capabilities {
            if let Some(capability) = node.capabilities.get_mut(name) {
                resolve_into(&source_capability.properties, &mut capability.properties, inputs);
            }
        }

        for (name, source_relationship) in &source_node.relationships {
            if let Some(relationship) = node.relationships.get_mut(name) {
                resolve_into(&source_relationship.properties, &mut relationship.properties, inputs);
            }
        }
    }
}

/// Point input-bound node artifacts at the environment's uploaded artifact.
///
/// Uploads for input artifacts the topology no longer declares are dropped. An
/// artifact without upload falls back to the topology's declared input artifact.
pub fn process_input_artifacts(derived: &mut DeploymentTopology) {
    let declared = &derived.template.input_artifacts;
    derived.uploaded_input_artifacts.retain(|name, _| declared.contains_key(name));

    let uploaded = &derived.uploaded_input_artifacts;
    for node in derived.template.node_templates.values_mut() {
        for artifact in node.artifacts.values_mut() {
            let Some(input) = artifact.input_artifact.as_deref() else {
                continue;
            };
            if let Some(provided) = uploaded.get(input).or_else(|| declared.get(input)) {
                artifact.reference.clone_from(&provided.reference);
                artifact.artifact_type.clone_from(&provided.artifact_type);
            }
        }
    }
}

/// Default and prune the orchestrator's deployment properties.
///
/// Without an orchestrator the properties are left untouched.
pub fn process_provider_deployment_properties(
    derived: &mut DeploymentTopology,
    orchestrator: Option<&Orchestrator>,
) {
    let Some(orchestrator) = orchestrator else {
        return;
    };

    let current = std::mem::take(&mut derived.provider_deployment_properties);
    derived.provider_deployment_properties = orchestrator
        .deployment_properties
        .iter()
        .filter_map(|(name, definition)| {
            current
                .get(name)
                .cloned()
                .or_else(|| definition.default.clone())
                .map(|value| (name.clone(), value))
        })
        .collect::<BTreeMap<_, _>>();
}

/// Replace every unresolved `get_input` reference with an explicit null.
///
/// Running it on a finalized topology changes nothing. Returns the number of
/// references replaced.
pub fn finalize(derived: &mut DeploymentTopology) -> usize {
    let mut replaced = 0;
    for node in derived.template.node_templates.values_mut() {
        for properties in node.property_maps_mut() {
            for value in properties.values_mut() {
                if value.as_ref().is_some_and(|v| v.input_reference().is_some()) {
                    *value = None;
                    replaced += 1;
                }
            }
        }
    }
    replaced
}
