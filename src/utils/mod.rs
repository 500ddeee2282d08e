//! Utility functions shared by the stores and the CLI.

pub mod fs;

pub use fs::{atomic_write, ensure_dir, remove_if_exists};
