//! Fan-out of device backups over a bounded pool of tasks.

use crate::models::{FailureKind, FailureRecord, JobResult};
use crate::worker::DeviceBackup;
use chrono::Local;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Default upper bound on devices processed at once
pub const DEFAULT_MAX_WORKERS: usize = 10;

pub struct Orchestrator {
    worker: Arc<dyn DeviceBackup>,
    max_workers: usize,
}

impl Orchestrator {
    pub fn new(worker: Arc<dyn DeviceBackup>, max_workers: usize) -> Self {
        Self {
            worker,
            max_workers: max_workers.max(1),
        }
    }

    /// Back up every non-empty address and wait for all of them.
    ///
    /// One device's outcome never affects another's; a lost worker task is
    /// reported as a failure of its device.
    pub async fn run(&self, devices: &[String]) -> JobResult {
        let job_id = Uuid::new_v4();
        let addresses: Vec<String> = devices
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(String::from)
            .collect();

        if addresses.is_empty() {
            tracing::info!(%job_id, "No devices to back up");
            return JobResult::empty(job_id);
        }

        let workers = addresses.len().min(self.max_workers);
        tracing::info!(%job_id, devices = addresses.len(), workers, "Starting backup job");

        let start = Instant::now();
        let permits = Arc::new(Semaphore::new(workers));
        let mut pending: FuturesUnordered<_> = addresses
            .iter()
            .cloned()
            .map(|address| {
                let worker = self.worker.clone();
                let permits = permits.clone();
                let task_address = address.clone();
                let handle = tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.map_err(|e| FailureRecord {
                        address: task_address.clone(),
                        kind: FailureKind::Unexpected,
                        error: format!("worker pool closed: {e}"),
                    })?;
                    worker.run(&task_address).await
                });
                async move { (address, handle.await) }
            })
            .collect();

        let mut result = JobResult::empty(job_id);
        result.attempted = addresses.len();

        while let Some((address, joined)) = pending.next().await {
            match joined {
                Ok(Ok(record)) => result.successes.push(record),
                Ok(Err(failure)) => result.failures.push(failure),
                Err(e) => {
                    tracing::error!(%job_id, address = %address, error = %e, "Worker task failed");
                    result.failures.push(FailureRecord {
                        address,
                        kind: FailureKind::Unexpected,
                        error: format!("worker task failed: {e}"),
                    });
                }
            }
        }

        result.total_duration = start.elapsed();
        result.finished_at = Local::now();
        tracing::info!(
            %job_id,
            succeeded = result.successes.len(),
            failed = result.failures.len(),
            duration_secs = result.total_duration.as_secs_f64(),
            "Backup job finished"
        );
        result
    }
}
