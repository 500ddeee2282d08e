//! Property value validation.
//!
//! Overrides written onto location resource templates and user supplied
//! deployment inputs are checked against their [`PropertyDefinition`] before
//! anything is written: first the declared type, then every constraint in
//! order. The first failure is returned and the caller's state is left
//! untouched.

use regex::Regex;

use crate::core::{EntityKind, TopologyError};
use crate::models::{
    Capability, LocationResourceTemplate, NodeType, PropertyConstraint, PropertyDefinition,
    PropertyType, PropertyValue,
};

/// Check a value against a property definition.
///
/// Explicit nulls and unresolved `get_input` references are always accepted.
pub fn validate_value(
    property: &str,
    definition: &PropertyDefinition,
    value: Option<&PropertyValue>,
) -> Result<(), TopologyError> {
    let Some(value) = value else {
        return Ok(());
    };
    if value.input_reference().is_some() {
        return Ok(());
    }

    check_type(property, definition.property_type, value)?;
    for constraint in &definition.constraints {
        check_constraint(property, constraint, value)?;
    }
    Ok(())
}

fn type_mismatch(property: &str, expected: PropertyType, value: &PropertyValue) -> TopologyError {
    TopologyError::TypeMismatch {
        property: property.to_string(),
        expected: expected.to_string(),
        value: value.to_string(),
    }
}

fn check_type(
    property: &str,
    expected: PropertyType,
    value: &PropertyValue,
) -> Result<(), TopologyError> {
    let valid = match (expected, value) {
        (PropertyType::List, PropertyValue::List(_)) => true,
        (PropertyType::Map, PropertyValue::Complex(_)) => true,
        (PropertyType::String, PropertyValue::Scalar(_)) => true,
        (PropertyType::Integer, PropertyValue::Scalar(s)) => s.trim().parse::<i64>().is_ok(),
        (PropertyType::Float, PropertyValue::Scalar(s)) => s.trim().parse::<f64>().is_ok(),
        (PropertyType::Boolean, PropertyValue::Scalar(s)) => {
            s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")
        }
        (PropertyType::Version, PropertyValue::Scalar(s)) => is_version(s),
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(type_mismatch(property, expected, value))
    }
}

/// `1`, `1.2`, `1.2.3` or `1.2.3.4`, optionally followed by a qualifier.
fn is_version(s: &str) -> bool {
    let (numbers, qualifier) = match s.split_once('-') {
        Some((numbers, qualifier)) => (numbers, Some(qualifier)),
        None => (s, None),
    };
    let parts: Vec<&str> = numbers.split('.').collect();
    let numeric = (1..=4).contains(&parts.len())
        && parts.iter().all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    numeric
        && qualifier.is_none_or(|q| {
            !q.is_empty() && q.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        })
}

fn violation(property: &str, reason: String) -> TopologyError {
    TopologyError::ConstraintViolation {
        property: property.to_string(),
        reason,
    }
}

fn numeric(property: &str, value: &PropertyValue) -> Result<f64, TopologyError> {
    match value {
        PropertyValue::Scalar(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| violation(property, format!("'{s}' is not a number"))),
        other => Err(violation(property, format!("'{other}' is not a number"))),
    }
}

fn length(value: &PropertyValue) -> usize {
    match value {
        PropertyValue::Scalar(s) => s.chars().count(),
        PropertyValue::Complex(map) => map.len(),
        PropertyValue::List(items) => items.len(),
        PropertyValue::GetInput(_) => 0,
    }
}

fn check_constraint(
    property: &str,
    constraint: &PropertyConstraint,
    value: &PropertyValue,
) -> Result<(), TopologyError> {
    match constraint {
        PropertyConstraint::Equal(expected) => match value {
            PropertyValue::Scalar(s) if s == expected => Ok(()),
            _ => Err(violation(property, format!("value must be equal to '{expected}'"))),
        },
        PropertyConstraint::ValidValues(values) => match value {
            PropertyValue::Scalar(s) if values.contains(s) => Ok(()),
            _ => Err(violation(
                property,
                format!("value must be one of [{}]", values.join(", ")),
            )),
        },
        PropertyConstraint::GreaterThan(bound) => {
            let n = numeric(property, value)?;
            if n > *bound {
                Ok(())
            } else {
                Err(violation(property, format!("{n} must be greater than {bound}")))
            }
        }
        PropertyConstraint::GreaterOrEqual(bound) => {
            let n = numeric(property, value)?;
            if n >= *bound {
                Ok(())
            } else {
                Err(violation(property, format!("{n} must be greater than or equal to {bound}")))
            }
        }
        PropertyConstraint::LessThan(bound) => {
            let n = numeric(property, value)?;
            if n < *bound {
                Ok(())
            } else {
                Err(violation(property, format!("{n} must be less than {bound}")))
            }
        }
        PropertyConstraint::LessOrEqual(bound) => {
            let n = numeric(property, value)?;
            if n <= *bound {
                Ok(())
            } else {
                Err(violation(property, format!("{n} must be less than or equal to {bound}")))
            }
        }
        PropertyConstraint::InRange(min, max) => {
            let n = numeric(property, value)?;
            if (*min..=*max).contains(&n) {
                Ok(())
            } else {
                Err(violation(property, format!("{n} must be in range [{min}, {max}]")))
            }
        }
        PropertyConstraint::Length(expected) => {
            let actual = length(value);
            if actual == *expected {
                Ok(())
            } else {
                Err(violation(property, format!("length {actual} must be exactly {expected}")))
            }
        }
        PropertyConstraint::MinLength(min) => {
            let actual = length(value);
            if actual >= *min {
                Ok(())
            } else {
                Err(violation(property, format!("length {actual} must be at least {min}")))
            }
        }
        PropertyConstraint::MaxLength(max) => {
            let actual = length(value);
            if actual <= *max {
                Ok(())
            } else {
                Err(violation(property, format!("length {actual} must be at most {max}")))
            }
        }
        PropertyConstraint::Pattern(pattern) => {
            let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                TopologyError::InvalidArgument {
                    reason: format!("Invalid pattern constraint '{pattern}' on '{property}': {e}"),
                }
            })?;
            match value {
                PropertyValue::Scalar(s) if regex.is_match(s) => Ok(()),
                _ => Err(violation(property, format!("value must match pattern '{pattern}'"))),
            }
        }
    }
}

/// Resolve a null override to the definition's default, then validate it.
fn effective_value(
    property: &str,
    definition: &PropertyDefinition,
    value: Option<PropertyValue>,
) -> Result<Option<PropertyValue>, TopologyError> {
    let value = value.or_else(|| definition.default_value());
    validate_value(property, definition, value.as_ref())?;
    Ok(value)
}

/// Set a property of a location resource template.
///
/// The property must be declared by the template's node type. A null value
/// falls back to the declared default (or stays null when there is none).
pub fn set_template_property(
    template: &mut LocationResourceTemplate,
    node_type: &NodeType,
    property: &str,
    value: Option<PropertyValue>,
) -> Result<(), TopologyError> {
    let definition = node_type
        .properties
        .get(property)
        .ok_or_else(|| TopologyError::not_found(EntityKind::Property, property))?;

    let value = effective_value(property, definition, value)?;
    template.template.properties.insert(property.to_string(), value);
    Ok(())
}

/// Set a property of one capability of a location resource template.
///
/// The capability and the property must both be declared by the template's
/// node type. The capability is added to the template if it has none yet.
pub fn set_template_capability_property(
    template: &mut LocationResourceTemplate,
    node_type: &NodeType,
    capability: &str,
    property: &str,
    value: Option<PropertyValue>,
) -> Result<(), TopologyError> {
    let capability_definition = node_type
        .capabilities
        .get(capability)
        .ok_or_else(|| TopologyError::not_found(EntityKind::Capability, capability))?;
    let definition = capability_definition
        .properties
        .get(property)
        .ok_or_else(|| TopologyError::not_found(EntityKind::Property, property))?;

    let value = effective_value(property, definition, value)?;
    template
        .template
        .capabilities
        .entry(capability.to_string())
        .or_insert_with(|| Capability::new(&capability_definition.capability_type))
        .properties
        .insert(property.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapabilityDefinition, NodeTemplate};

    fn scalar(s: &str) -> PropertyValue {
        PropertyValue::scalar(s)
    }

    #[test]
    fn test_type_checks() {
        let integer = PropertyDefinition::of_type(PropertyType::Integer);
        assert!(validate_value("cpus", &integer, Some(&scalar("4"))).is_ok());
        assert!(matches!(
            validate_value("cpus", &integer, Some(&scalar("four"))),
            Err(TopologyError::TypeMismatch { .. })
        ));

        let boolean = PropertyDefinition::of_type(PropertyType::Boolean);
        assert!(validate_value("public", &boolean, Some(&scalar("TRUE"))).is_ok());
        assert!(validate_value("public", &boolean, Some(&scalar("yes"))).is_err());

        let version = PropertyDefinition::of_type(PropertyType::Version);
        assert!(validate_value("v", &version, Some(&scalar("1.2.3-SNAPSHOT"))).is_ok());
        assert!(validate_value("v", &version, Some(&scalar("1..2"))).is_err());

        let list = PropertyDefinition::of_type(PropertyType::List);
        assert!(validate_value("l", &list, Some(&PropertyValue::List(vec![]))).is_ok());
        assert!(validate_value("l", &list, Some(&scalar("x"))).is_err());
    }

    #[test]
    fn test_null_and_get_input_are_accepted() {
        let definition = PropertyDefinition::of_type(PropertyType::Integer)
            .with_constraint(PropertyConstraint::GreaterThan(10.0));
        assert!(validate_value("cpus", &definition, None).is_ok());
        assert!(
            validate_value("cpus", &definition, Some(&PropertyValue::get_input("cpus"))).is_ok()
        );
    }

    #[test]
    fn test_constraints() {
        let definition = PropertyDefinition::of_type(PropertyType::Integer)
            .with_constraint(PropertyConstraint::InRange(1.0, 8.0));
        assert!(validate_value("cpus", &definition, Some(&scalar("8"))).is_ok());
        assert!(matches!(
            validate_value("cpus", &definition, Some(&scalar("9"))),
            Err(TopologyError::ConstraintViolation { .. })
        ));

        let sizes = PropertyDefinition::string().with_constraint(PropertyConstraint::ValidValues(
            vec!["S".into(), "M".into(), "L".into()],
        ));
        assert!(validate_value("size", &sizes, Some(&scalar("L"))).is_ok());
        assert!(validate_value("size", &sizes, Some(&scalar("XL"))).is_err());

        let pattern = PropertyDefinition::string()
            .with_constraint(PropertyConstraint::Pattern("[a-z]+-\\d".into()));
        assert!(validate_value("name", &pattern, Some(&scalar("web-1"))).is_ok());
        assert!(validate_value("name", &pattern, Some(&scalar("web-1x"))).is_err());

        let max = PropertyDefinition::string().with_constraint(PropertyConstraint::MaxLength(3));
        assert!(validate_value("code", &max, Some(&scalar("abcd"))).is_err());
    }

    #[test]
    fn test_invalid_pattern_is_invalid_argument() {
        let definition =
            PropertyDefinition::string().with_constraint(PropertyConstraint::Pattern("(".into()));
        assert!(matches!(
            validate_value("name", &definition, Some(&scalar("x"))),
            Err(TopologyError::InvalidArgument { .. })
        ));
    }

    fn compute_type() -> NodeType {
        NodeType::new("org.example.Compute")
            .with_property("size", PropertyDefinition::string().with_default("M"))
            .with_capability(
                "scalable",
                CapabilityDefinition {
                    capability_type: "tosca.capabilities.Scalable".to_string(),
                    properties: [(
                        "max_instances".to_string(),
                        PropertyDefinition::of_type(PropertyType::Integer),
                    )]
                    .into_iter()
                    .collect(),
                },
            )
    }

    #[test]
    fn test_set_template_property_null_uses_default() {
        let node_type = compute_type();
        let mut template = LocationResourceTemplate::new(
            "small",
            "aws",
            NodeTemplate::new("org.example.Compute").with_property("size", Some(scalar("S"))),
        );

        set_template_property(&mut template, &node_type, "size", None).unwrap();
        assert_eq!(template.template.properties["size"], Some(scalar("M")));
    }

    #[test]
    fn test_set_template_property_unknown_property() {
        let node_type = compute_type();
        let mut template =
            LocationResourceTemplate::new("small", "aws", NodeTemplate::new("org.example.Compute"));

        let err = set_template_property(&mut template, &node_type, "color", Some(scalar("red")))
            .unwrap_err();
        assert!(matches!(err, TopologyError::NotFound { kind: EntityKind::Property, .. }));
        assert!(template.template.properties.is_empty());
    }

    #[test]
    fn test_set_template_capability_property_creates_capability() {
        let node_type = compute_type();
        let mut template =
            LocationResourceTemplate::new("small", "aws", NodeTemplate::new("org.example.Compute"));

        set_template_capability_property(
            &mut template,
            &node_type,
            "scalable",
            "max_instances",
            Some(scalar("3")),
        )
        .unwrap();

        let capability = &template.template.capabilities["scalable"];
        assert_eq!(capability.capability_type, "tosca.capabilities.Scalable");
        assert_eq!(capability.properties["max_instances"], Some(scalar("3")));

        let err = set_template_capability_property(
            &mut template,
            &node_type,
            "scalable",
            "max_instances",
            Some(scalar("many")),
        )
        .unwrap_err();
        assert!(matches!(err, TopologyError::TypeMismatch { .. }));
        assert_eq!(
            template.template.capabilities["scalable"].properties["max_instances"],
            Some(scalar("3"))
        );
    }
}
