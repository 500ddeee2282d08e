//! Shared helpers for the integration tests.

use anyhow::Result;
use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use topology_sync::store::FileStore;
use topology_sync::test_utils::CatalogFixture;

/// A temporary file store seeded with the sample catalog.
pub struct TestStore {
    dir: TempDir,
    pub fixture: CatalogFixture,
}

impl TestStore {
    pub async fn seeded() -> Result<Self> {
        let dir = TempDir::new()?;
        let fixture = CatalogFixture::new();
        fixture.write_to(&FileStore::new(dir.path().join("store"))).await?;
        Ok(Self {
            dir,
            fixture,
        })
    }

    /// Seed from synchronous tests.
    pub fn seeded_blocking() -> Result<Self> {
        tokio::runtime::Builder::new_current_thread().enable_all().build()?.block_on(Self::seeded())
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("store")
    }

    /// A fresh handle on the same directory.
    pub fn open(&self) -> FileStore {
        FileStore::new(self.store_path())
    }

    pub fn document(&self, collection: &str, id: &str) -> PathBuf {
        self.store_path().join(collection).join(format!("{id}.json"))
    }

    /// `topo-sync` bound to this store, isolated from the user's configuration.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("topo-sync").unwrap();
        cmd.env("TOPO_SYNC_CONFIG", self.config_path())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .arg("--quiet")
            .arg("--store")
            .arg(self.store_path());
        cmd
    }

    /// Configuration file path; absent unless a test writes it.
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}
