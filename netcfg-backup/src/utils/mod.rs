//! Utility modules shared across the backup pipeline.

pub mod errors;
pub mod logger;

pub use errors::{BackupError, ConfigError, NotifyError, StoreError};
