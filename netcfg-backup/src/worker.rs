//! Backup of a single device: fetch, persist, commit, retain.

use crate::config::AppConfig;
use crate::models::{BackupRecord, FailureRecord};
use crate::parser::device_identity;
use crate::session::{fetch_output, CommandOutput, SessionConnector};
use crate::store::VersionedStore;
use crate::utils::BackupError;
use async_trait::async_trait;
use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

/// Second-resolution stamp embedded in snapshot file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Suffixes tried when a snapshot name is already taken
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Command that dumps the running configuration
    pub command: String,

    /// Snapshot file extension (without the dot)
    pub extension: String,

    /// Snapshots kept on disk per identity
    pub retention_limit: usize,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            command: config.ssh.command.clone(),
            extension: config.storage.extension.clone(),
            retention_limit: config.storage.max_backups,
        }
    }
}

/// One device's backup, as scheduled by the orchestrator.
#[async_trait]
pub trait DeviceBackup: Send + Sync {
    async fn run(&self, address: &str) -> Result<BackupRecord, FailureRecord>;
}

pub struct DeviceBackupWorker {
    connector: Arc<dyn SessionConnector>,
    store: Arc<VersionedStore>,
    settings: WorkerSettings,
}

impl DeviceBackupWorker {
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        store: Arc<VersionedStore>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            connector,
            store,
            settings,
        }
    }

    /// Back up one device. Every failure is captured as a [`FailureRecord`].
    pub async fn run(&self, address: &str) -> Result<BackupRecord, FailureRecord> {
        let address = address.trim();
        tracing::info!(address, "Starting backup");

        self.backup(address).await.map_err(|e| {
            tracing::error!(address, error = %e, "Backup failed");
            FailureRecord::from_error(address, &e)
        })
    }

    async fn backup(&self, address: &str) -> Result<BackupRecord, BackupError> {
        let start = Instant::now();

        let output = self.fetch(address).await?;
        if !output.stderr.trim().is_empty() {
            tracing::warn!(address, stderr = %output.stderr.trim(), "Device wrote to stderr");
        }
        if let Some(status) = output.exit_status.filter(|s| *s != 0) {
            tracing::warn!(address, status, "Command exited with non-zero status");
        }

        let identity = device_identity(&output.stdout, address);
        tracing::info!(address, identity = %identity, "Device identified");

        let dir = self.store.root().join(&identity);
        tokio::fs::create_dir_all(&dir).await?;

        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let (filename, path) = write_snapshot(
            &dir,
            &identity,
            &timestamp,
            &self.settings.extension,
            output.stdout.as_bytes(),
        )
        .await?;

        let size_bytes = tokio::fs::metadata(&path).await?.len();
        let duration = start.elapsed();
        tracing::info!(address, path = %path.display(), size_bytes, "Backup saved");

        let outcome = self
            .store
            .record_snapshot(
                PathBuf::from(&identity).join(&filename),
                format!("Backup {identity} - {filename}"),
                identity.clone(),
                self.settings.retention_limit,
            )
            .await;

        if let Err(e) = &outcome.commit {
            tracing::warn!(address, identity = %identity, error = %e, "Git commit failed");
        }
        match &outcome.pruned {
            Ok(deleted) if !deleted.is_empty() => {
                tracing::info!(identity = %identity, deleted = deleted.len(), "Pruned old backups");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(identity = %identity, error = %e, "Cleanup failed"),
        }

        Ok(BackupRecord {
            address: address.to_string(),
            identity,
            filename,
            size_bytes,
            duration,
            timestamp,
        })
    }

    async fn fetch(&self, address: &str) -> Result<CommandOutput, BackupError> {
        let connector = self.connector.clone();
        let address = address.to_string();
        let command = self.settings.command.clone();

        tokio::task::spawn_blocking(move || fetch_output(connector.as_ref(), &address, &command))
            .await
            .map_err(|e| BackupError::Unexpected(format!("session task failed: {e}")))?
    }
}

#[async_trait]
impl DeviceBackup for DeviceBackupWorker {
    async fn run(&self, address: &str) -> Result<BackupRecord, FailureRecord> {
        DeviceBackupWorker::run(self, address).await
    }
}

/// Create `{identity}_{timestamp}.{ext}` exclusively, adding `_N` on collision.
async fn write_snapshot(
    dir: &Path,
    identity: &str,
    timestamp: &str,
    extension: &str,
    contents: &[u8],
) -> io::Result<(String, PathBuf)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let filename = match attempt {
            0 => format!("{identity}_{timestamp}.{extension}"),
            n => format!("{identity}_{timestamp}_{n}.{extension}"),
        };
        let path = dir.join(&filename);

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        };

        let written = async {
            file.write_all(contents).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
        return Ok((filename, path));
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free snapshot name for {identity} at {timestamp}"),
    ))
}
