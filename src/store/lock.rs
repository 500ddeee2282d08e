//! Process-wide exclusive locks on store documents.
//!
//! The file store takes a [`DocumentLock`] around every read-compare-write of a
//! deployment topology, so two processes saving the same document serialize on
//! the lock and the second one sees the first one's revision.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::constants::collections::LOCKS;

/// An exclusive lock on one document, released on drop.
pub struct DocumentLock {
    file: File,
    path: PathBuf,
}

impl DocumentLock {
    /// Block until the lock for `name` under `root` is held.
    ///
    /// The lock file lives at `{root}/.locks/{name}.lock` and is left in place
    /// after release. Waiting happens on the blocking pool, not on the runtime.
    pub async fn acquire(root: &Path, name: &str) -> Result<Self> {
        let locks_dir = root.join(LOCKS);
        tokio::fs::create_dir_all(&locks_dir)
            .await
            .with_context(|| format!("Failed to create locks directory {}", locks_dir.display()))?;

        let path = locks_dir.join(format!("{name}.lock"));
        let lock_path = path.clone();
        let name = name.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path)
                .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
            file.lock_exclusive().with_context(|| format!("Failed to lock document '{name}'"))?;
            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::trace!("Acquired lock {}", path.display());
        Ok(Self {
            file,
            path,
        })
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn test_lock_file_is_created_under_locks_dir() {
        let temp_dir = TempDir::new().unwrap();

        let lock = DocumentLock::acquire(temp_dir.path(), "deployment-v1-prod").await.unwrap();
        let lock_path = temp_dir.path().join(LOCKS).join("deployment-v1-prod.lock");
        assert!(lock_path.exists());

        drop(lock);
        assert!(lock_path.exists());
    }

    #[tokio::test]
    async fn test_same_document_waits_for_holder() {
        let temp_dir = TempDir::new().unwrap();
        let root = Arc::new(temp_dir.path().to_path_buf());
        let barrier = Arc::new(Barrier::new(2));

        let holder_root = root.clone();
        let holder_barrier = barrier.clone();
        let holder = tokio::spawn(async move {
            let _lock = DocumentLock::acquire(&holder_root, "doc").await.unwrap();
            holder_barrier.wait().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let waiter = tokio::spawn(async move {
            barrier.wait().await;
            let start = Instant::now();
            let _lock = DocumentLock::acquire(&root, "doc").await.unwrap();
            assert!(start.elapsed() >= Duration::from_millis(50));
        });

        holder.await.unwrap();
        waiter.await.unwrap();
    }
}
