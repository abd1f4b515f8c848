//! Local script execution using `tokio::process`

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::error::ExecError;
use crate::traits::ScriptRunner;

/// Default interpreter for local scripts
pub const DEFAULT_SHELL: &str = "sh";

/// Local script runner
///
/// Runs the whole script as `<shell> -c <script>` on this machine.
#[derive(Debug, Clone)]
pub struct LocalRunner {
    shell: String,
}

impl LocalRunner {
    /// Create a runner using `sh`
    #[must_use]
    pub fn new() -> Self {
        Self::with_shell(DEFAULT_SHELL)
    }

    /// Create a runner using a different interpreter, e.g. `bash`
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Interpreter in use
    #[must_use]
    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptRunner for LocalRunner {
    #[instrument(skip(self, script), fields(shell = %self.shell), level = "debug")]
    async fn run(&self, script: &str) -> Result<String, ExecError> {
        let start = Instant::now();

        debug!(bytes = script.len(), "executing local script");

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                error!(error = %e, "failed to spawn shell");
                ExecError::execution(format!("failed to spawn {}: {e}", self.shell), "", "")
            })?;

        // Drains both pipes concurrently so a chatty stderr cannot stall the child
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::execution(format!("failed to wait for script: {e}"), "", ""))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(
            status = %output.status,
            duration = ?start.elapsed(),
            "local script completed"
        );

        if !output.status.success() {
            error!(status = %output.status, stderr = %stderr, "local script failed");
            return Err(ExecError::execution(output.status.to_string(), stdout, stderr));
        }

        Ok(stdout)
    }

    fn runner_type(&self) -> &'static str {
        "local"
    }
}
