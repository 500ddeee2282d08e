//! Integration test suite for topo-sync
//!
//! These tests drive the engine end to end over the on-disk [`FileStore`]:
//! once through the library API and once through the `topo-sync` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **file_store**: the synchronization service persisting to a file store
//! - **cli**: the `topo-sync` commands, their output and exit codes
//!
//! [`FileStore`]: topology_sync::store::FileStore

mod cli;
mod common;
mod file_store;
