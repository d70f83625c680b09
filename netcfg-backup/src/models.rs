//! Records produced by a backup job.

use crate::utils::BackupError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// A snapshot that was written to the backup root.
#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    /// Address the configuration was fetched from
    pub address: String,

    /// Sanitized device identity (storage partition key)
    pub identity: String,

    /// Snapshot file name inside the identity directory
    pub filename: String,

    pub size_bytes: u64,

    /// Fetch and persist time, excluding the commit
    pub duration: Duration,

    /// Second-resolution stamp embedded in the file name
    pub timestamp: String,
}

impl BackupRecord {
    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authentication,
    Transport,
    Unexpected,
}

/// A device that could not be backed up.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub address: String,
    pub kind: FailureKind,
    pub error: String,
}

impl FailureRecord {
    pub fn from_error(address: &str, err: &BackupError) -> Self {
        let kind = match err {
            BackupError::Authentication(_) => FailureKind::Authentication,
            BackupError::Transport(_) => FailureKind::Transport,
            BackupError::Io(_) | BackupError::Unexpected(_) => FailureKind::Unexpected,
        };
        Self {
            address: address.to_string(),
            kind,
            error: err.to_string(),
        }
    }
}

/// Aggregate outcome of one job run.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub job_id: Uuid,

    /// Non-empty addresses a worker was dispatched for
    pub attempted: usize,

    /// Successes in completion order
    pub successes: Vec<BackupRecord>,

    /// Failures in completion order
    pub failures: Vec<FailureRecord>,

    pub total_duration: Duration,
    pub finished_at: DateTime<Local>,
}

impl JobResult {
    pub fn empty(job_id: Uuid) -> Self {
        Self {
            job_id,
            attempted: 0,
            successes: Vec::new(),
            failures: Vec::new(),
            total_duration: Duration::ZERO,
            finished_at: Local::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.successes.is_empty() && self.failures.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_follows_error() {
        let auth = FailureRecord::from_error(
            "10.0.0.1",
            &BackupError::Authentication("bad password".into()),
        );
        assert_eq!(auth.kind, FailureKind::Authentication);
        assert_eq!(auth.error, "authentication failed: bad password");

        let io = FailureRecord::from_error(
            "10.0.0.2",
            &BackupError::Io(std::io::Error::other("disk full")),
        );
        assert_eq!(io.kind, FailureKind::Unexpected);
        assert_eq!(io.address, "10.0.0.2");
    }

    #[test]
    fn test_empty_job_result() {
        let result = JobResult::empty(Uuid::new_v4());
        assert!(result.is_empty());
        assert!(!result.has_failures());
        assert_eq!(result.record_count(), 0);
    }
}
