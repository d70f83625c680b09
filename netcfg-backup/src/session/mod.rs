//! Remote shell sessions to network devices.
//!
//! Sessions are blocking; callers run them on the blocking thread pool.

mod ssh;

pub use ssh::{SshConnector, SshSession};

use crate::utils::BackupError;

/// Output of one non-interactive command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<i32>,
}

/// An authenticated session to a single device.
pub trait DeviceSession: Send {
    /// Run one command and collect its output.
    fn exec(&mut self, command: &str) -> Result<CommandOutput, BackupError>;

    /// Tear the session down. Errors are ignored.
    fn close(&mut self) {}
}

/// Opens sessions to device addresses.
pub trait SessionConnector: Send + Sync {
    fn connect(&self, address: &str) -> Result<Box<dyn DeviceSession>, BackupError>;
}

/// Connect, run `command`, and close the session on every path.
pub fn fetch_output(
    connector: &dyn SessionConnector,
    address: &str,
    command: &str,
) -> Result<CommandOutput, BackupError> {
    let mut session = connector.connect(address)?;
    let output = session.exec(command);
    session.close();
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FlakySession {
        closed: Arc<AtomicBool>,
    }

    impl DeviceSession for FlakySession {
        fn exec(&mut self, _command: &str) -> Result<CommandOutput, BackupError> {
            Err(BackupError::Transport("channel reset".into()))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct FlakyConnector {
        closed: Arc<AtomicBool>,
    }

    impl SessionConnector for FlakyConnector {
        fn connect(&self, _address: &str) -> Result<Box<dyn DeviceSession>, BackupError> {
            Ok(Box::new(FlakySession {
                closed: self.closed.clone(),
            }))
        }
    }

    #[test]
    fn test_session_closed_when_command_fails() {
        let closed = Arc::new(AtomicBool::new(false));
        let connector = FlakyConnector {
            closed: closed.clone(),
        };

        let result = fetch_output(&connector, "10.0.0.1", "show running-config");

        assert!(matches!(result, Err(BackupError::Transport(_))));
        assert!(closed.load(Ordering::SeqCst));
    }
}
