//! Versioned snapshot store.
//!
//! Every mutation of the repository (commit or retention pruning) happens
//! through a [`StoreGuard`], so at most one is in flight at any time.

mod git;

pub use git::{Committer, GitHistory};

use crate::retention::RetentionManager;
use crate::utils::StoreError;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Append-only commit history over the backup root.
pub trait History: Send {
    /// Stage exactly `relative_path` and commit it; returns the commit id.
    fn commit(&mut self, relative_path: &Path, message: &str) -> Result<String, StoreError>;

    /// Called under the same lock once retention has run for `identity`.
    ///
    /// Working-tree deletions are not recorded in history by default.
    fn pruned(&mut self, _identity: &str, _deleted: &[PathBuf]) {}
}

pub struct VersionedStore {
    root: PathBuf,
    retention: Arc<RetentionManager>,
    history: Arc<Mutex<Box<dyn History>>>,
}

/// Result of the serialized commit + retention region.
#[derive(Debug)]
pub struct SnapshotOutcome {
    pub commit: Result<String, StoreError>,
    pub pruned: Result<Vec<PathBuf>, StoreError>,
}

impl VersionedStore {
    pub fn new(root: impl Into<PathBuf>, extension: &str, history: Box<dyn History>) -> Self {
        let root = root.into();
        Self {
            retention: Arc::new(RetentionManager::new(root.clone(), extension)),
            history: Arc::new(Mutex::new(history)),
            root,
        }
    }

    /// Open the git history at `root`, creating it when missing.
    pub fn open_or_init(
        root: &Path,
        extension: &str,
        committer: Committer,
    ) -> Result<Self, StoreError> {
        let history = GitHistory::open_or_init(root, committer)?;
        Ok(Self::new(root, extension, Box::new(history)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enter the exclusive mutation region.
    pub async fn lock(&self) -> StoreGuard {
        StoreGuard {
            history: self.history.clone().lock_owned().await,
            retention: self.retention.clone(),
        }
    }

    /// Commit a written snapshot and prune its identity, as one region.
    pub async fn record_snapshot(
        &self,
        relative_path: PathBuf,
        message: String,
        identity: String,
        limit: usize,
    ) -> SnapshotOutcome {
        let mut guard = self.lock().await;
        let task = tokio::task::spawn_blocking(move || {
            let commit = guard.commit(&relative_path, &message);
            let pruned = guard.enforce_retention(&identity, limit);
            guard
                .history
                .pruned(&identity, pruned.as_deref().unwrap_or_default());
            SnapshotOutcome { commit, pruned }
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => SnapshotOutcome {
                commit: Err(StoreError::Task(e.to_string())),
                pruned: Err(StoreError::Task(e.to_string())),
            },
        }
    }
}

/// Exclusive access to the repository; released on drop.
pub struct StoreGuard {
    history: OwnedMutexGuard<Box<dyn History>>,
    retention: Arc<RetentionManager>,
}

impl StoreGuard {
    pub fn commit(&mut self, relative_path: &Path, message: &str) -> Result<String, StoreError> {
        ensure_inside_root(relative_path)?;
        self.history.commit(relative_path, message)
    }

    pub fn enforce_retention(&self, identity: &str, limit: usize) -> Result<Vec<PathBuf>, StoreError> {
        ensure_inside_root(Path::new(identity))?;
        Ok(self.retention.enforce(identity, limit)?)
    }
}

fn ensure_inside_root(path: &Path) -> Result<(), StoreError> {
    let escapes = path.as_os_str().is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(StoreError::OutsideRoot(path.display().to_string()));
    }
    Ok(())
}
