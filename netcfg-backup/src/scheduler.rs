//! Cron-driven repetition of the backup job.

use crate::job::BackupJob;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

pub struct BackupScheduler {
    scheduler: Mutex<JobScheduler>,
    job: Arc<BackupJob>,
}

impl BackupScheduler {
    pub async fn new(job: Arc<BackupJob>) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            job,
        })
    }

    /// Register the backup job under a six-field cron expression.
    pub async fn schedule(&self, cron_expression: &str) -> anyhow::Result<()> {
        let backup = self.job.clone();
        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let backup = backup.clone();
            Box::pin(async move {
                tracing::info!("Starting scheduled backup");
                backup.try_run().await;
            })
        })?;

        self.scheduler.lock().await.add(job).await?;
        tracing::info!(cron = %cron_expression, "Backup job scheduled");
        Ok(())
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    /// Stop ticking and wait for an in-flight run to finish.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.shutdown().await?;
        self.job.wait_idle().await;
        Ok(())
    }
}
