//! Core types shared across the crate.
//!
//! The only inhabitant today is the error taxonomy: [`TopologyError`] for precise
//! handling in code, and [`ErrorContext`] / [`user_friendly_error`] for actionable
//! messages in the CLI.

pub mod error;

pub use error::{
    EntityKind, ErrorContext, TopologyError, closest_match, user_friendly_error,
};
