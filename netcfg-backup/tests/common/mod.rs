//! Fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use netcfg_backup::notify::Notifier;
use netcfg_backup::session::{CommandOutput, DeviceSession, SessionConnector};
use netcfg_backup::store::History;
use netcfg_backup::utils::{BackupError, NotifyError, StoreError};
use netcfg_backup::{DeviceBackupWorker, VersionedStore, WorkerSettings};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How a scripted device answers.
#[derive(Clone)]
pub enum Device {
    Config(String),
    ConfigWithStderr(String, String),
    AuthFailure,
    TransportFailure,
    Panic,
}

/// Answers connections from a fixed script and tracks concurrency.
#[derive(Default)]
pub struct ScriptedConnector {
    devices: HashMap<String, Device>,
    delay: Duration,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub connects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, address: &str, device: Device) -> Self {
        self.devices.insert(address.to_string(), device);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl SessionConnector for ScriptedConnector {
    fn connect(&self, address: &str) -> Result<Box<dyn DeviceSession>, BackupError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);

        let result = match self.devices.get(address) {
            Some(Device::AuthFailure) => Err(BackupError::Authentication(
                "Authentication failed.".into(),
            )),
            Some(Device::TransportFailure) | None => Err(BackupError::Transport(format!(
                "connect to {address}:22 failed: Connection refused"
            ))),
            Some(Device::Panic) => {
                self.active.fetch_sub(1, Ordering::SeqCst);
                panic!("session library crashed");
            }
            Some(Device::Config(config)) => Ok(ScriptedSession {
                stdout: config.clone(),
                stderr: String::new(),
            }),
            Some(Device::ConfigWithStderr(config, stderr)) => Ok(ScriptedSession {
                stdout: config.clone(),
                stderr: stderr.clone(),
            }),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result.map(|s| Box::new(s) as Box<dyn DeviceSession>)
    }
}

struct ScriptedSession {
    stdout: String,
    stderr: String,
}

impl DeviceSession for ScriptedSession {
    fn exec(&mut self, _command: &str) -> Result<CommandOutput, BackupError> {
        Ok(CommandOutput {
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            exit_status: Some(0),
        })
    }
}

/// History that records each commit + retention region it observes.
///
/// A region opens in `commit` and closes in `pruned`.
#[derive(Clone, Default)]
pub struct RecordingHistory {
    pub intervals: Arc<Mutex<Vec<(Instant, Instant)>>>,
    pub messages: Arc<Mutex<Vec<String>>>,
    pub deleted: Arc<Mutex<Vec<PathBuf>>>,
    in_region: Arc<AtomicUsize>,
    pub overlaps: Arc<AtomicUsize>,
    open: Option<Instant>,
    hold: Duration,
    fail: bool,
}

impl RecordingHistory {
    pub fn holding(hold: Duration) -> Self {
        Self {
            hold,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl History for RecordingHistory {
    fn commit(&mut self, _relative_path: &Path, message: &str) -> Result<String, StoreError> {
        if self.in_region.fetch_add(1, Ordering::SeqCst) != 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.open = Some(Instant::now());
        std::thread::sleep(self.hold);

        if self.fail {
            return Err(StoreError::Git {
                command: "commit".into(),
                stderr: "fatal: unable to write new index file".into(),
            });
        }
        let mut messages = self.messages.lock().unwrap();
        messages.push(message.to_string());
        Ok(format!("{:040x}", messages.len()))
    }

    fn pruned(&mut self, _identity: &str, deleted: &[PathBuf]) {
        let Some(start) = self.open.take() else {
            return;
        };
        self.deleted.lock().unwrap().extend_from_slice(deleted);
        std::thread::sleep(self.hold);
        self.in_region.fetch_sub(1, Ordering::SeqCst);
        self.intervals.lock().unwrap().push((start, Instant::now()));
    }
}

/// Notifier that counts deliveries.
#[derive(Default)]
pub struct CountingNotifier {
    pub messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub fn running_config(hostname: &str) -> String {
    format!(
        "! generated by test\n# hostname decoy\nhostname {hostname}\ninterface gigabit-ethernet 1/1/1\n no shutdown\n!\nend\n"
    )
}

/// A configuration of exactly `size` bytes naming `hostname`.
pub fn sized_config(hostname: &str, size: usize) -> String {
    let mut config = running_config(hostname);
    let filler = size.saturating_sub(config.len());
    config.push_str(&"!".repeat(filler));
    config.truncate(size);
    config
}

pub fn worker(
    connector: Arc<dyn SessionConnector>,
    root: &Path,
    history: RecordingHistory,
    retention_limit: usize,
) -> Arc<DeviceBackupWorker> {
    let store = VersionedStore::new(root, "conf", Box::new(history));
    Arc::new(DeviceBackupWorker::new(
        connector,
        Arc::new(store),
        WorkerSettings {
            command: "show running-config".into(),
            extension: "conf".into(),
            retention_limit,
        },
    ))
}
