//! Execution target types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Credentials and address of a remote host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    /// Path to the private key used for public-key auth
    pub key_path: PathBuf,
    /// Login user
    pub user: String,
    /// Host address (no port, SSH always uses 22)
    pub host: String,
}

impl RemoteTarget {
    /// Create a new remote target
    pub fn new(
        key_path: impl Into<PathBuf>,
        user: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            key_path: key_path.into(),
            user: user.into(),
            host: host.into(),
        }
    }
}

/// Where a script runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionTarget {
    /// This machine
    Local,
    /// A host reached over SSH
    Remote(RemoteTarget),
}

impl ExecutionTarget {
    /// Pick the target from optional remote settings
    ///
    /// Only the host decides: a missing or blank host means local, anything
    /// else means remote even if the key or user is missing (those then fail
    /// when the connection is attempted).
    pub fn select(
        host: Option<&str>,
        user: impl Into<String>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        match host.map(str::trim) {
            Some(host) if !host.is_empty() => {
                ExecutionTarget::Remote(RemoteTarget::new(key_path, user, host))
            }
            _ => ExecutionTarget::Local,
        }
    }

    /// Host name for logs
    #[must_use]
    pub fn describe(&self) -> &str {
        match self {
            ExecutionTarget::Local => "localhost",
            ExecutionTarget::Remote(remote) => &remote.host,
        }
    }

    /// Whether the target is the local machine
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, ExecutionTarget::Local)
    }
}
