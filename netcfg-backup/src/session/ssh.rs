use super::{CommandOutput, DeviceSession, SessionConnector};
use crate::config::AppConfig;
use crate::utils::{BackupError, ConfigError};
use std::fmt::Display;
use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// LIBSSH2_ERROR_AUTHENTICATION_FAILED
const AUTH_FAILED: i32 = -18;

/// Password-authenticated SSH sessions via libssh2.
pub struct SshConnector {
    port: u16,
    username: String,
    password: String,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl SshConnector {
    pub fn new(
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Self {
        Self {
            port,
            username: username.into(),
            password: password.into(),
            connect_timeout,
            command_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let (username, password) = config.credentials().ok_or(ConfigError::MissingCredentials)?;
        Ok(Self::new(
            config.ssh.port,
            username,
            password,
            config.ssh.connect_timeout(),
            config.ssh.command_timeout(),
        ))
    }

    fn open_tcp(&self, host: &str) -> Result<TcpStream, BackupError> {
        let addrs: Vec<SocketAddr> = (host, self.port)
            .to_socket_addrs()
            .map_err(|e| BackupError::Transport(format!("cannot resolve {host}: {e}")))?
            .collect();

        let mut last_err = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, self.connect_timeout) {
                Ok(tcp) => return Ok(tcp),
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => BackupError::Transport(format!("connect to {host}:{} failed: {e}", self.port)),
            None => BackupError::Transport(format!("{host} resolved to no addresses")),
        })
    }
}

impl SessionConnector for SshConnector {
    fn connect(&self, address: &str) -> Result<Box<dyn DeviceSession>, BackupError> {
        let host = address.trim();
        let tcp = self.open_tcp(host)?;

        let mut session = ssh2::Session::new().map_err(transport)?;
        session.set_timeout(millis(self.connect_timeout));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(transport)?;

        session
            .userauth_password(&self.username, &self.password)
            .map_err(|e| match e.code() {
                ssh2::ErrorCode::Session(AUTH_FAILED) => {
                    BackupError::Authentication(e.message().to_string())
                }
                _ => transport(e),
            })?;
        if !session.authenticated() {
            return Err(BackupError::Authentication("password rejected".into()));
        }

        session.set_timeout(millis(self.command_timeout));
        tracing::debug!(address = %host, "SSH session established");
        Ok(Box::new(SshSession { session }))
    }
}

pub struct SshSession {
    session: ssh2::Session,
}

impl DeviceSession for SshSession {
    fn exec(&mut self, command: &str) -> Result<CommandOutput, BackupError> {
        let mut channel = self.session.channel_session().map_err(transport)?;
        channel.exec(command).map_err(transport)?;

        let mut stdout = Vec::new();
        channel.read_to_end(&mut stdout).map_err(transport)?;
        let mut stderr = Vec::new();
        channel.stderr().read_to_end(&mut stderr).map_err(transport)?;
        channel.wait_close().map_err(transport)?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status: channel.exit_status().ok(),
        })
    }

    fn close(&mut self) {
        let _ = self.session.disconnect(None, "backup complete", None);
    }
}

fn transport(e: impl Display) -> BackupError {
    BackupError::Transport(e.to_string())
}

fn millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}
