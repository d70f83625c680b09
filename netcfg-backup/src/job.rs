//! One complete backup run: orchestrate, then report.

use crate::models::JobResult;
use crate::notify::{NotificationReporter, ReportOutcome, SkipReason};
use crate::orchestrator::Orchestrator;
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct JobRun {
    pub result: JobResult,
    pub notification: ReportOutcome,
}

pub struct BackupJob {
    orchestrator: Orchestrator,
    reporter: NotificationReporter,
    devices: Vec<String>,
    running: Mutex<()>,
}

impl BackupJob {
    pub fn new(
        orchestrator: Orchestrator,
        reporter: NotificationReporter,
        devices: Vec<String>,
    ) -> Self {
        Self {
            orchestrator,
            reporter,
            devices,
            running: Mutex::new(()),
        }
    }

    /// Run the job, waiting for any run already in progress.
    pub async fn run(&self) -> JobRun {
        let _running = self.running.lock().await;
        self.run_inner().await
    }

    /// Run the job unless one is already in progress.
    pub async fn try_run(&self) -> Option<JobRun> {
        let Ok(_running) = self.running.try_lock() else {
            tracing::warn!("Skipping scheduled run: job already running");
            return None;
        };
        Some(self.run_inner().await)
    }

    /// Wait until no run is in progress.
    pub async fn wait_idle(&self) {
        let _ = self.running.lock().await;
    }

    async fn run_inner(&self) -> JobRun {
        let result = self.orchestrator.run(&self.devices).await;
        let notification = if result.attempted == 0 {
            ReportOutcome::Skipped(SkipReason::NothingToReport)
        } else {
            self.reporter.report(&result).await
        };
        tracing::info!(job_id = %result.job_id, "Backup job completed");
        JobRun {
            result,
            notification,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::SshConnector;
    use crate::store::{History, VersionedStore};
    use crate::utils::StoreError;
    use crate::worker::{DeviceBackupWorker, WorkerSettings};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoHistory;

    impl History for NoHistory {
        fn commit(&mut self, _relative_path: &Path, _message: &str) -> Result<String, StoreError> {
            Ok(String::new())
        }
    }

    pub(crate) fn idle_job(devices: Vec<String>) -> BackupJob {
        let connector = Arc::new(SshConnector::new(
            22,
            "admin",
            "secret",
            Duration::from_secs(1),
            Duration::from_secs(1),
        ));
        let store = Arc::new(VersionedStore::new(
            std::env::temp_dir(),
            "conf",
            Box::new(NoHistory),
        ));
        let worker = Arc::new(DeviceBackupWorker::new(
            connector,
            store,
            WorkerSettings {
                command: "show running-config".into(),
                extension: "conf".into(),
                retention_limit: 10,
            },
        ));
        BackupJob::new(
            Orchestrator::new(worker, 10),
            NotificationReporter::new(None),
            devices,
        )
    }

    #[tokio::test]
    async fn test_run_without_devices() {
        let run = idle_job(Vec::new()).run().await;
        assert!(run.result.is_empty());
        assert_eq!(
            run.notification,
            ReportOutcome::Skipped(SkipReason::NothingToReport)
        );
    }

    #[tokio::test]
    async fn test_try_run_skips_while_running() {
        let job = idle_job(Vec::new());

        let held = job.running.lock().await;
        assert!(job.try_run().await.is_none());
        drop(held);

        assert!(job.try_run().await.is_some());
    }
}
