//! Error types for scriptline-exec

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur while running a script locally or remotely
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// The private key could not be read or parsed
    #[error("failed to load SSH key {}: {reason}", .path.display())]
    Credential {
        /// Path the key was loaded from
        path: PathBuf,
        /// Why loading failed
        reason: String,
    },

    /// Every connection attempt failed
    #[error("failed to connect to {host} after {attempts} attempts, giving up: {last_error}")]
    ConnectionExhausted {
        /// Target host
        host: String,
        /// Number of attempts actually made
        attempts: u32,
        /// Error from the final attempt
        last_error: TransportError,
    },

    /// Connection establishment failed
    #[error("failed to connect to {host}: {source}")]
    Connection {
        /// Target host
        host: String,
        /// Underlying credential or retry failure
        #[source]
        source: Box<ExecError>,
    },

    /// Session could not be opened on an established connection
    #[error("failed to create session on {host}: {message}")]
    Session {
        /// Target host
        host: String,
        /// Error message
        message: String,
    },

    /// The script ran (or failed to start) and did not exit cleanly
    ///
    /// Streams are decoded as UTF-8 with invalid sequences replaced by
    /// U+FFFD. They are empty when the script never started, or when the
    /// remote transport failed mid-command (partial output is not kept).
    #[error("script execution failed: {cause}\nSTDOUT: {stdout}\nSTDERR: {stderr}")]
    Execution {
        /// Exit status, signal or spawn failure
        cause: String,
        /// Captured stdout
        stdout: String,
        /// Captured stderr
        stderr: String,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ExecError {
    /// Build an execution error from a cause and both captured streams
    pub fn execution(
        cause: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        ExecError::Execution {
            cause: cause.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Wrap a connect-with-retry failure with the host it was aimed at
    pub fn connection(host: impl Into<String>, source: ExecError) -> Self {
        ExecError::Connection {
            host: host.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error, looking through `Connection` wrappers
    #[must_use]
    pub fn root(&self) -> &ExecError {
        match self {
            ExecError::Connection { source, .. } => source.root(),
            other => other,
        }
    }

    /// Captured `(stdout, stderr)` if the script got to run
    #[must_use]
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            ExecError::Execution { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_message_embeds_streams() {
        let err = ExecError::execution("exit status: 2", "partial\n", "boom\n");
        let msg = err.to_string();

        assert!(msg.starts_with("script execution failed: exit status: 2"));
        assert!(msg.contains("STDOUT: partial\n"));
        assert!(msg.contains("STDERR: boom\n"));
        assert_eq!(err.captured_output(), Some(("partial\n", "boom\n")));
    }

    #[test]
    fn test_exhausted_reports_real_attempt_count() {
        let err = ExecError::ConnectionExhausted {
            host: "10.0.0.5".to_string(),
            attempts: 20,
            last_error: TransportError::Dial("connection refused".to_string()),
        };

        assert_eq!(
            err.to_string(),
            "failed to connect to 10.0.0.5 after 20 attempts, giving up: dial failed: connection refused"
        );
    }

    #[test]
    fn test_root_looks_through_connection() {
        let inner = ExecError::Credential {
            path: PathBuf::from("/missing"),
            reason: "not found".to_string(),
        };
        let err = ExecError::connection("host-a", inner);

        assert!(err.to_string().starts_with("failed to connect to host-a: "));
        assert!(matches!(err.root(), ExecError::Credential { .. }));
    }
}
