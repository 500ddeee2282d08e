//! Command-line interface of `topo-sync`.
//!
//! Every command works on a [`FileStore`](crate::store::FileStore) rooted at the
//! configured store path and goes through the
//! [`DeploymentTopologyService`](crate::deployment::DeploymentTopologyService).
//!
//! # Commands
//!
//! - `sync`: synchronize an environment's deployment topology and show it
//! - `set-location`: place an environment's deployment on a location
//! - `set-property`: override a property of a substituted node
//! - `substitute`: bind a node to another candidate resource
//! - `set-input`: set or unset deployment input values
//! - `list`: deployment topologies derived from a topology
//! - `finalize`: print the deployment topology as handed to deployment planning
//! - `delete`: delete an environment's deployment topologies
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet`: log level (`RUST_LOG` applies otherwise)
//! - `--config`: configuration file
//! - `--store`: store directory, overriding the configuration
//! - `--format`: `text` (default) or `json`

mod common;
mod input;
mod location;
mod manage;
mod substitution;
mod sync;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use common::OutputFormat;

#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// `None` disables logging.
    pub log_level: Option<String>,
    pub config_path: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
    pub format: OutputFormat,
}

#[derive(Parser)]
#[command(
    name = "topo-sync",
    about = "Keep deployment topologies synchronized with their source topologies and locations",
    version,
    long_about = "topo-sync derives location-bound deployment topologies from application topologies, \
                  substitutes abstract nodes by location resources and keeps both in sync."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable logging
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Configuration file
    #[arg(short, long, global = true, env = "TOPO_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Store directory
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize an environment's deployment topology
    Sync(sync::SyncCommand),

    /// Place an environment's deployment on a location
    SetLocation(location::SetLocationCommand),

    /// Override a property of a substituted node
    SetProperty(substitution::SetPropertyCommand),

    /// Bind a node to another candidate resource
    Substitute(substitution::SubstituteCommand),

    /// Set or unset deployment input values
    SetInput(input::SetInputCommand),

    /// List the deployment topologies derived from a topology
    List(manage::ListCommand),

    /// Print the finalized deployment topology of an environment
    Finalize(sync::FinalizeCommand),

    /// Delete the deployment topologies of an environment
    Delete(manage::DeleteCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        init_logging(config.log_level.as_deref());
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
            store_path: self.store.clone(),
            format: self.format,
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let ctx = common::CommandContext::open(&config).await?;

        match self.command {
            Commands::Sync(cmd) => cmd.execute(&ctx).await,
            Commands::SetLocation(cmd) => cmd.execute(&ctx).await,
            Commands::SetProperty(cmd) => cmd.execute(&ctx).await,
            Commands::Substitute(cmd) => cmd.execute(&ctx).await,
            Commands::SetInput(cmd) => cmd.execute(&ctx).await,
            Commands::List(cmd) => cmd.execute(&ctx).await,
            Commands::Finalize(cmd) => cmd.execute(&ctx).await,
            Commands::Delete(cmd) => cmd.execute(&ctx).await,
        }
    }
}

/// Install the log subscriber on stderr, so JSON output on stdout stays parseable.
fn init_logging(level: Option<&str>) {
    let Some(level) = level else {
        return;
    };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
