//! Property values and property definitions.
//!
//! Property values coming from callers are dynamically typed (a string, a nested
//! mapping, or a list). They are modelled as the closed [`PropertyValue`] variant,
//! and [`PropertyValue::from_json`] is the single conversion point from untyped
//! JSON: any other shape is rejected with an invalid-argument error.
//!
//! A property slot may also hold an unresolved `get_input` reference
//! ([`PropertyValue::GetInput`]) until input processing replaces it, and an explicit
//! null (`None` in a [`PropertyMap`]) once a topology is finalized for deployment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::TopologyError;

/// Property slots of a node, capability or relationship.
///
/// `None` is an explicit null value.
pub type PropertyMap = BTreeMap<String, Option<PropertyValue>>;

/// A property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// A plain string value.
    Scalar(String),
    /// A nested mapping.
    Complex(serde_json::Map<String, serde_json::Value>),
    /// A sequence.
    List(Vec<serde_json::Value>),
    /// A reference to a topology input, resolved during input processing.
    GetInput(String),
}

impl PropertyValue {
    /// Convert an untyped JSON value into a property value.
    ///
    /// `null` converts to `None` (an explicit null slot). Strings, objects and
    /// arrays map onto [`Self::Scalar`], [`Self::Complex`] and [`Self::List`].
    /// Numbers and booleans are rejected: callers pass scalars as strings.
    pub fn from_json(value: serde_json::Value) -> Result<Option<Self>, TopologyError> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(Self::Scalar(s))),
            Value::Object(map) => Ok(Some(Self::Complex(map))),
            Value::Array(items) => Ok(Some(Self::List(items))),
            other => Err(TopologyError::InvalidArgument {
                reason: format!(
                    "Property type {} is invalid, expected a string, a mapping or a list",
                    json_kind(&other)
                ),
            }),
        }
    }

    /// Shorthand for a scalar value.
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    /// Shorthand for a `get_input` reference.
    pub fn get_input(input: impl Into<String>) -> Self {
        Self::GetInput(input.into())
    }

    /// The input name if this is an unresolved `get_input` reference.
    #[must_use]
    pub fn input_reference(&self) -> Option<&str> {
        match self {
            Self::GetInput(input) => Some(input),
            _ => None,
        }
    }

    /// Render the value as untyped JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{Value, json};

        match self {
            Self::Scalar(s) => Value::String(s.clone()),
            Self::Complex(map) => Value::Object(map.clone()),
            Self::List(items) => Value::Array(items.clone()),
            Self::GetInput(input) => json!({ "get_input": input }),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => f.write_str(s),
            Self::GetInput(input) => write!(f, "{{ get_input: {input} }}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "map",
    }
}

/// Declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Version,
    List,
    Map,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Version => "version",
            Self::List => "list",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

/// A constraint on the value of a scalar property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyConstraint {
    Equal(String),
    ValidValues(Vec<String>),
    GreaterThan(f64),
    GreaterOrEqual(f64),
    LessThan(f64),
    LessOrEqual(f64),
    InRange(f64, f64),
    Length(usize),
    MinLength(usize),
    MaxLength(usize),
    Pattern(String),
}

/// Definition of a property on a node type, capability or orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PropertyDefinition {
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<PropertyConstraint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertyDefinition {
    /// A string property without default or constraints.
    #[must_use]
    pub fn string() -> Self {
        Self::default()
    }

    /// A property of the given type.
    #[must_use]
    pub fn of_type(property_type: PropertyType) -> Self {
        Self {
            property_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: PropertyConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// The default value as a property value, ignoring blank defaults.
    #[must_use]
    pub fn default_value(&self) -> Option<PropertyValue> {
        self.default
            .as_deref()
            .filter(|default| !default.trim().is_empty())
            .map(PropertyValue::scalar)
    }
}

/// Build the default property slots for a set of definitions.
///
/// Every definition gets a slot; definitions without a usable default get an
/// explicit null.
#[must_use]
pub fn default_properties(definitions: &BTreeMap<String, PropertyDefinition>) -> PropertyMap {
    definitions.iter().map(|(name, definition)| (name.clone(), definition.default_value())).collect()
}
