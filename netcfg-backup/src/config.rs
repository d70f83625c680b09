//! Configuration management for the backup job.
//!
//! Settings are read once, either from a TOML file or from the environment
//! (after loading a `.env` file), and passed down explicitly.

use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Device connection addresses
    #[serde(default)]
    pub devices: Vec<String>,

    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub job: JobConfig,

    /// Telegram delivery; absent means notifications are skipped
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// TCP port used for every device
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Connect, handshake and authentication timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Remote command timeout (seconds)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Command that dumps the running configuration
    #[serde(default = "default_command")]
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the git working tree holding all snapshots
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Snapshots kept on disk per device
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    /// Snapshot file extension (without the dot)
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default = "default_committer_name")]
    pub committer_name: String,

    #[serde(default = "default_committer_email")]
    pub committer_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Upper bound on concurrently processed devices
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Six-field cron expression; `None` runs the job once
    #[serde(default)]
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(skip_serializing)]
    pub bot_token: String,

    pub chat_id: String,

    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_command_timeout() -> u64 {
    60
}

fn default_command() -> String {
    "show running-config".to_string()
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("/backups")
}

fn default_max_backups() -> usize {
    10
}

fn default_extension() -> String {
    "conf".to_string()
}

fn default_committer_name() -> String {
    "netcfg-backup".to_string()
}

fn default_committer_email() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    format!("netcfg-backup@{host}")
}

fn default_max_workers() -> usize {
    10
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            username: None,
            password: None,
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            command: default_command(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            max_backups: default_max_backups(),
            extension: default_extension(),
            committer_name: default_committer_name(),
            committer_email: default_committer_email(),
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            schedule: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SshConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.devices = split_devices(&config.devices.join(","));
        Ok(config)
    }

    /// Load configuration from the process environment.
    ///
    /// `env_file` names a dotenv file to load first; otherwise `.env` in the
    /// working directory is used when present.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::Invalid {
                    field: "env_file",
                    reason: e.to_string(),
                })?;
            }
            None => {
                let _ = dotenvy::dotenv();
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let telegram = match (non_empty("TELEGRAM_BOT_TOKEN"), non_empty("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                bot_token,
                chat_id,
                api_url: non_empty("TELEGRAM_API_URL").unwrap_or_else(default_telegram_api_url),
            }),
            _ => None,
        };

        Ok(Self {
            devices: split_devices(&get("ROUTER_HOSTS").unwrap_or_default()),
            ssh: SshConfig {
                port: parse_var(&get, "PORT", default_port())?,
                username: non_empty("DATACOM_USERNAME"),
                password: non_empty("DATACOM_PASSWORD"),
                connect_timeout_secs: parse_var(
                    &get,
                    "SSH_CONNECT_TIMEOUT",
                    default_connect_timeout(),
                )?,
                command_timeout_secs: parse_var(
                    &get,
                    "SSH_COMMAND_TIMEOUT",
                    default_command_timeout(),
                )?,
                command: non_empty("BACKUP_COMMAND").unwrap_or_else(default_command),
            },
            storage: StorageConfig {
                backup_dir: non_empty("BACKUP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_backup_dir),
                max_backups: parse_var(&get, "MAX_BACKUPS", default_max_backups())?,
                extension: non_empty("BACKUP_EXTENSION").unwrap_or_else(default_extension),
                committer_name: non_empty("GIT_AUTHOR_NAME")
                    .unwrap_or_else(default_committer_name),
                committer_email: non_empty("GIT_AUTHOR_EMAIL")
                    .unwrap_or_else(default_committer_email),
            },
            job: JobConfig {
                max_workers: parse_var(&get, "MAX_WORKERS", default_max_workers())?,
                schedule: non_empty("BACKUP_SCHEDULE"),
            },
            telegram,
            log: LogConfig {
                level: non_empty("LOG_LEVEL").unwrap_or_else(default_log_level),
            },
        })
    }

    /// Reject configurations that cannot run a single device.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        if self.credentials().is_none() {
            return Err(ConfigError::MissingCredentials);
        }
        if self.storage.max_backups == 0 {
            return Err(ConfigError::Invalid {
                field: "max_backups",
                reason: "must keep at least one snapshot".into(),
            });
        }
        if self.job.max_workers == 0 {
            return Err(ConfigError::Invalid {
                field: "max_workers",
                reason: "must be at least 1".into(),
            });
        }
        if self.storage.extension.is_empty() || self.storage.extension.contains(['/', '\\', '.']) {
            return Err(ConfigError::Invalid {
                field: "extension",
                reason: format!("{:?} is not a plain file extension", self.storage.extension),
            });
        }
        Ok(())
    }

    /// Username and password, when both are set and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.ssh.username, &self.ssh.password) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some((user.as_str(), pass.as_str()))
            }
            _ => None,
        }
    }
}

fn split_devices(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_var<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            field: key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
