//! Connection seam between the remote runner and the SSH library
//!
//! `RemoteRunner` only talks to these traits. The russh-backed
//! implementation lives in [`crate::ssh`]; tests plug in doubles.

use std::sync::Arc;

use async_trait::async_trait;
use russh::keys::ssh_key::PrivateKey;
use thiserror::Error;

/// Errors raised by a transport implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// TCP connect or SSH handshake failed
    #[error("dial failed: {0}")]
    Dial(String),

    /// Server rejected the credential
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Channel open, exec or close failed
    #[error("channel error: {0}")]
    Channel(String),
}

/// Everything needed to dial one remote host
#[derive(Clone)]
pub struct DialParams {
    /// Host address, without port
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Login user
    pub user: String,
    /// Parsed private key used for public-key auth
    pub key: Arc<PrivateKey>,
}

impl std::fmt::Debug for DialParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Output collected from one session command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutput {
    /// Exit status reported by the server, if any
    pub exit_status: Option<u32>,
    /// Signal name if the command was killed
    pub exit_signal: Option<String>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl SessionOutput {
    /// Exited with status 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_status == Some(0) && self.exit_signal.is_none()
    }

    /// Human readable reason the command did not succeed
    #[must_use]
    pub fn failure_cause(&self) -> String {
        match (&self.exit_signal, self.exit_status) {
            (Some(signal), _) => format!("remote command killed by signal {signal}"),
            (None, Some(status)) => format!("remote command exited with status {status}"),
            (None, None) => "remote command exited without reporting a status".to_string(),
        }
    }
}

/// Opens connections to remote hosts
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connection type produced by a successful dial
    type Connection: Connection;

    /// Connect and authenticate; a single attempt, no retry
    async fn dial(&self, params: &DialParams) -> Result<Self::Connection, TransportError>;
}

/// An established, authenticated connection
#[async_trait]
pub trait Connection: Send {
    /// Session type opened on this connection
    type Session: Session;

    /// Open one command session
    async fn open_session(&mut self) -> Result<Self::Session, TransportError>;

    /// Tear the connection down
    async fn close(self) -> Result<(), TransportError>;
}

/// A single command channel on a connection
#[async_trait]
pub trait Session: Send {
    /// Run `command` and collect its output until the channel closes
    async fn exec(&mut self, command: &str) -> Result<SessionOutput, TransportError>;

    /// Release the channel
    async fn close(self) -> Result<(), TransportError>;
}
