//! Error handling for topology synchronization
//!
//! This module provides the error taxonomy and user-friendly error reporting for the
//! deployment topology engine. Like the rest of the crate, operations return
//! [`anyhow::Result`], while the concrete failure modes are expressed as
//! [`TopologyError`] values that callers can recover with
//! [`anyhow::Error::downcast_ref`].
//!
//! # Error Categories
//!
//! - **Not found**: [`TopologyError::NotFound`], [`TopologyError::NoSubstitutions`],
//!   [`TopologyError::SubstitutionNotFound`]
//! - **Unsupported configuration**: [`TopologyError::UnsupportedOperation`]
//! - **Property validation**: [`TopologyError::ConstraintViolation`],
//!   [`TopologyError::TypeMismatch`], [`TopologyError::InvalidArgument`]
//! - **Authorization**: [`TopologyError::Unauthorized`]
//! - **Persistence**: [`TopologyError::ConcurrentModification`], [`TopologyError::IoError`],
//!   [`TopologyError::JsonError`], [`TopologyError::TomlError`]
//!
//! A stored location id that no longer resolves is deliberately *not* an error
//! surfaced to callers: the synchronization façade regenerates the deployment
//! topology instead.
//!
//! # Examples
//!
//! ```rust,no_run
//! use topology_sync::core::{EntityKind, TopologyError, user_friendly_error};
//!
//! fn lookup() -> anyhow::Result<()> {
//!     Err(TopologyError::not_found(EntityKind::Environment, "prod").into())
//! }
//!
//! if let Err(e) = lookup() {
//!     assert!(TopologyError::is_not_found(&e));
//!     user_friendly_error(e).display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    DeploymentTopology,
    Topology,
    Environment,
    Version,
    Location,
    ResourceTemplate,
    NodeType,
    Orchestrator,
    Node,
    Capability,
    Property,
    Input,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DeploymentTopology => "Deployment topology",
            Self::Topology => "Topology",
            Self::Environment => "Environment",
            Self::Version => "Version",
            Self::Location => "Location",
            Self::ResourceTemplate => "Location resource template",
            Self::NodeType => "Node type",
            Self::Orchestrator => "Orchestrator",
            Self::Node => "Node template",
            Self::Capability => "Capability",
            Self::Property => "Property",
            Self::Input => "Input",
        };
        f.write_str(name)
    }
}

/// The main error type for topology synchronization.
///
/// Each variant maps onto one category of the failure taxonomy. All of them are
/// surfaced to the caller before the terminal save of an operation, so a failed
/// operation never leaves a partially written deployment topology behind.
#[derive(Error, Debug)]
pub enum TopologyError {
    /// A referenced entity does not exist.
    #[error("{kind} [{id}] doesn't exist")]
    NotFound {
        /// What kind of entity was looked up
        kind: EntityKind,
        /// The identifier that failed to resolve
        id: String,
    },

    /// The deployment topology has no substituted node at all.
    #[error("Topology does not have any node substituted")]
    NoSubstitutions,

    /// The requested node is not bound to a location resource.
    #[error("Topology does not have the node <{node}> substituted")]
    SubstitutionNotFound {
        /// The node template that has no binding
        node: String,
    },

    /// The requested configuration is not supported by the engine.
    #[error("Unsupported operation: {reason}")]
    UnsupportedOperation {
        /// Why the request was rejected
        reason: String,
    },

    /// A property value violates one of its definition's constraints.
    #[error("Property '{property}' violates constraint: {reason}")]
    ConstraintViolation {
        /// The property that was being set
        property: String,
        /// Description of the violated constraint
        reason: String,
    },

    /// A property value does not match its declared type.
    #[error("Property '{property}' expects a value of type {expected}, got '{value}'")]
    TypeMismatch {
        /// The property that was being set
        property: String,
        /// The declared property type
        expected: String,
        /// The rejected value, rendered for display
        value: String,
    },

    /// An argument had a shape the engine cannot represent.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Why the argument was rejected
        reason: String,
    },

    /// The caller lacks the required role on a location.
    #[error("Access denied to location '{location}': one of the roles [{roles}] is required")]
    Unauthorized {
        /// The location id
        location: String,
        /// Accepted roles, comma separated
        roles: String,
    },

    /// A save raced with another writer of the same document.
    #[error(
        "Deployment topology [{id}] was modified concurrently (expected revision {expected}, found {found})"
    )]
    ConcurrentModification {
        /// The document id
        id: String,
        /// Revision the writer started from
        expected: u64,
        /// Revision currently stored
        found: u64,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("{message}")]
    Other {
        message: String,
    },
}

impl TopologyError {
    /// Shorthand for [`TopologyError::NotFound`].
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether an `anyhow` error carries one of the not-found conditions.
    #[must_use]
    pub fn is_not_found(error: &anyhow::Error) -> bool {
        matches!(
            error.downcast_ref::<Self>(),
            Some(
                Self::NotFound { .. } | Self::NoSubstitutions | Self::SubstitutionNotFound { .. }
            )
        )
    }
}

impl Clone for TopologyError {
    fn clone(&self) -> Self {
        match self {
            Self::NotFound {
                kind,
                id,
            } => Self::NotFound {
                kind: *kind,
                id: id.clone(),
            },
            Self::NoSubstitutions => Self::NoSubstitutions,
            Self::SubstitutionNotFound {
                node,
            } => Self::SubstitutionNotFound {
                node: node.clone(),
            },
            Self::UnsupportedOperation {
                reason,
            } => Self::UnsupportedOperation {
                reason: reason.clone(),
            },
            Self::ConstraintViolation {
                property,
                reason,
            } => Self::ConstraintViolation {
                property: property.clone(),
                reason: reason.clone(),
            },
            Self::TypeMismatch {
                property,
                expected,
                value,
            } => Self::TypeMismatch {
                property: property.clone(),
                expected: expected.clone(),
                value: value.clone(),
            },
            Self::InvalidArgument {
                reason,
            } => Self::InvalidArgument {
                reason: reason.clone(),
            },
            Self::Unauthorized {
                location,
                roles,
            } => Self::Unauthorized {
                location: location.clone(),
                roles: roles.clone(),
            },
            Self::ConcurrentModification {
                id,
                expected,
                found,
            } => Self::ConcurrentModification {
                id: id.clone(),
                expected: *expected,
                found: *found,
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::JsonError(e) => Self::Other {
                message: format!("JSON error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// An error wrapped with details and an actionable suggestion for CLI users.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: TopologyError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: TopologyError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Suggest the closest known identifier to `unknown`, if any is reasonably close.
///
/// Used to enrich not-found errors with a "did you mean" hint.
#[must_use]
pub fn closest_match<'a>(
    unknown: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|candidate| (candidate, strsim::jaro_winkler(unknown, candidate)))
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}

/// Convert any error into an [`ErrorContext`] with suggestions.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<ErrorContext>() {
        Ok(context) => return context,
        Err(error) => error,
    };

    if let Some(topology_error) = error.downcast_ref::<TopologyError>() {
        return create_error_context(topology_error.clone());
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(TopologyError::Other {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the configuration file")
        .with_details("TOML parsing errors are usually caused by missing quotes or mismatched brackets");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(TopologyError::Other {
        message,
    })
}

fn create_error_context(error: TopologyError) -> ErrorContext {
    match &error {
        TopologyError::NotFound { kind, .. } => {
            let suggestion = match kind {
                EntityKind::Location => {
                    "Check the location id, or run 'topo-sync sync' so the deployment topology drops locations that were deleted"
                }
                EntityKind::Environment | EntityKind::Version | EntityKind::Topology => {
                    "Check that the application environment and its current version exist in the store"
                }
                _ => "Check the identifier and that the store contains the expected documents",
            };
            ErrorContext::new(error.clone()).with_suggestion(suggestion)
        }

        TopologyError::NoSubstitutions | TopologyError::SubstitutionNotFound { .. } => {
            ErrorContext::new(error.clone())
                .with_suggestion("Assign a location with 'topo-sync set-location' and synchronize before overriding substituted properties")
                .with_details("Only nodes bound to a location resource can carry property overrides")
        }

        TopologyError::UnsupportedOperation { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Provide a single group to location mapping")
            .with_details("Placement currently uses one implicit group that contains every node"),

        TopologyError::ConstraintViolation { .. } | TopologyError::TypeMismatch { .. } => {
            ErrorContext::new(error.clone())
                .with_suggestion("Check the property definition of the resource type for allowed values")
                .with_details("The override was rejected and nothing was written")
        }

        TopologyError::Unauthorized { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Ask a location administrator to grant you the deployer role"),

        TopologyError::ConcurrentModification { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Re-run the command: another writer saved the deployment topology first")
            .with_details("Saves are rejected when the stored revision differs from the one the change started from"),

        _ => ErrorContext::new(error),
    }
}
