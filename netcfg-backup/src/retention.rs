//! Per-device snapshot retention on the working tree.
//!
//! Only files on disk are pruned; git history keeps every snapshot.

use std::io;
use std::path::PathBuf;
use std::time::SystemTime;
use walkdir::WalkDir;

/// A snapshot file discovered under an identity directory
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    pub modified: SystemTime,
}

#[derive(Debug, Clone)]
pub struct RetentionManager {
    root: PathBuf,
    extension: String,
}

impl RetentionManager {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn identity_dir(&self, identity: &str) -> PathBuf {
        self.root.join(identity)
    }

    /// Snapshots of `identity`, oldest first.
    pub fn snapshots(&self, identity: &str) -> io::Result<Vec<Snapshot>> {
        let dir = self.identity_dir(identity);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = format!("{identity}_");
        let suffix = format!(".{}", self.extension);
        let mut snapshots = Vec::new();

        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !name.starts_with(&prefix) || !name.ends_with(&suffix) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            snapshots.push(Snapshot {
                path: entry.into_path(),
                modified,
            });
        }

        // same-second collisions get `_N` suffixes; shorter names are older
        snapshots.sort_by(|a, b| {
            let name_a = a.path.file_name().unwrap_or_default();
            let name_b = b.path.file_name().unwrap_or_default();
            a.modified
                .cmp(&b.modified)
                .then_with(|| name_a.len().cmp(&name_b.len()))
                .then_with(|| name_a.cmp(name_b))
        });
        Ok(snapshots)
    }

    /// Keep the `limit` most recently modified snapshots of `identity`.
    ///
    /// Returns the deleted paths, oldest first.
    pub fn enforce(&self, identity: &str, limit: usize) -> io::Result<Vec<PathBuf>> {
        let snapshots = self.snapshots(identity)?;
        if snapshots.len() <= limit {
            return Ok(Vec::new());
        }

        let excess = snapshots.len() - limit;
        let mut deleted = Vec::with_capacity(excess);
        for snapshot in snapshots.into_iter().take(excess) {
            std::fs::remove_file(&snapshot.path)?;
            tracing::info!(identity, path = %snapshot.path.display(), "Deleted old backup");
            deleted.push(snapshot.path);
        }
        Ok(deleted)
    }
}
