//! Error types for each layer of the backup pipeline.

use thiserror::Error;

/// Terminal failure of a single device backup.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Failure of a mutation against the versioned store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("path {0} is outside the backup root")]
    OutsideRoot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store task failed: {0}")]
    Task(String),
}

/// Failure to deliver a job summary.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Configuration that makes a run impossible.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no devices configured")]
    NoDevices,

    #[error("device credentials are missing")]
    MissingCredentials,

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
