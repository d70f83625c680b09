//! Network Device Configuration Backup
//!
//! Fetches running configurations over SSH from a fleet of devices in
//! parallel, stores each snapshot in a git working tree, keeps a bounded
//! number of snapshots per device on disk, and reports the outcome.

pub mod config;
pub mod job;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod parser;
pub mod retention;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod utils;
pub mod worker;

// Re-export commonly used types
pub use config::AppConfig;
pub use job::{BackupJob, JobRun};
pub use models::{BackupRecord, FailureKind, FailureRecord, JobResult};
pub use orchestrator::Orchestrator;
pub use store::VersionedStore;
pub use utils::errors::BackupError;
pub use worker::{DeviceBackup, DeviceBackupWorker, WorkerSettings};
