//! Engine configuration file.
//!
//! ```toml
//! # Where the file store keeps its documents (`~` is expanded)
//! store_path = "~/deployments/.topo-sync"
//!
//! # Identity checked against location roles; omit to allow every location
//! user = "alice"
//! groups = ["ops"]
//!
//! # "exact" (default) or "count"
//! substitution_change_detection = "exact"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::{CONFIG_ENV_VAR, DEFAULT_STORE_DIR};
use crate::deployment::ChangeDetection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory of the file store.
    pub store_path: String,

    /// User whose location roles are checked when placing deployments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Groups of [`Self::user`].
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    pub substitution_change_detection: ChangeDetection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_path: DEFAULT_STORE_DIR.to_string(),
            user: None,
            groups: Vec::new(),
            substitution_change_detection: ChangeDetection::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `$TOPO_SYNC_CONFIG`, or from the default path.
    ///
    /// A missing file yields the default configuration.
    pub async fn load() -> Result<Self> {
        let path = match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => PathBuf::from(path),
            Err(_) => Self::default_path()?,
        };
        Self::load_if_exists(&path).await
    }

    /// Load from `path` when given, falling back to [`Self::load`].
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_if_exists(&path).await,
            None => Self::load().await,
        }
    }

    async fn load_if_exists(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path).await
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// `~/.topo-sync/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(DEFAULT_STORE_DIR).join("config.toml"))
    }

    /// The store path with `~` and environment variables expanded.
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.store_path)
            .with_context(|| format!("Failed to expand store path '{}'", self.store_path))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig::load_with_optional(Some(temp_dir.path().join("none.toml")))
            .await
            .unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.store_path, ".topo-sync");
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let config = EngineConfig {
            store_path: "/srv/topologies".into(),
            user: Some("alice".into()),
            groups: vec!["ops".into()],
            substitution_change_detection: ChangeDetection::Count,
        };

        config.save_to(&path).await.unwrap();
        assert_eq!(EngineConfig::load_from(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "substitution_change_detection = \"count\"\n").unwrap();

        let config = EngineConfig::load_from(&path).await.unwrap();
        assert_eq!(config.substitution_change_detection, ChangeDetection::Count);
        assert_eq!(config.store_path, ".topo-sync");
        assert!(config.user.is_none());
    }

    #[tokio::test]
    async fn test_invalid_toml_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "store_path = [").unwrap();

        let err = EngineConfig::load_from(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_resolved_store_path_expands_home() {
        let config = EngineConfig {
            store_path: "~/store".into(),
            ..EngineConfig::default()
        };
        let resolved = config.resolved_store_path().unwrap();
        assert!(!resolved.to_string_lossy().starts_with('~'));
        assert!(resolved.ends_with("store"));
    }
}
