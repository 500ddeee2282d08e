//! Configuration of the engine and the CLI.
//!
//! A single TOML file, looked up in this order:
//!
//! 1. the `--config` flag
//! 2. the `TOPO_SYNC_CONFIG` environment variable
//! 3. `~/.topo-sync/config.toml`
//!
//! A missing file is not an error; every key has a default.

mod engine;

pub use engine::EngineConfig;
