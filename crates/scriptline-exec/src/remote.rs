//! Remote script execution over SSH

use async_trait::async_trait;
use tracing::{debug, error, instrument, warn};

use crate::error::ExecError;
use crate::result::RemoteTarget;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper, connect_with_retry};
use crate::ssh::RusshTransport;
use crate::traits::ScriptRunner;
use crate::transport::{Connection, Session, Transport};

/// Remote script runner
///
/// Every `run` dials a fresh connection (with retry), opens one session,
/// runs the script, and closes the session and the connection before
/// returning. Nothing is kept between calls.
#[derive(Debug, Clone)]
pub struct RemoteRunner<T = RusshTransport, S = TokioSleeper> {
    target: RemoteTarget,
    policy: RetryPolicy,
    transport: T,
    sleeper: S,
}

impl RemoteRunner {
    /// Create a runner using russh and the default retry policy
    #[must_use]
    pub fn new(target: RemoteTarget) -> Self {
        Self::with_parts(target, RetryPolicy::default(), RusshTransport::new(), TokioSleeper)
    }
}

impl<T, S> RemoteRunner<T, S>
where
    T: Transport,
    S: Sleeper,
{
    /// Create a runner from explicit parts
    pub fn with_parts(target: RemoteTarget, policy: RetryPolicy, transport: T, sleeper: S) -> Self {
        Self {
            target,
            policy,
            transport,
            sleeper,
        }
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Target host and credentials
    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    /// Active retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn run_in_session(
        &self,
        conn: &mut T::Connection,
        script: &str,
    ) -> Result<String, ExecError> {
        let mut session = conn.open_session().await.map_err(|e| ExecError::Session {
            host: self.target.host.clone(),
            message: e.to_string(),
        })?;

        debug!(bytes = script.len(), "executing remote script");
        let exec = session.exec(script).await;

        if let Err(e) = session.close().await {
            debug!(error = %e, "session close failed");
        }

        let output = exec.map_err(|e| {
            ExecError::execution(format!("failed to run remote command: {e}"), "", "")
        })?;

        if !output.success() {
            let cause = output.failure_cause();
            error!(cause = %cause, stderr = %output.stderr, "remote script failed");
            return Err(ExecError::execution(cause, output.stdout, output.stderr));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl<T, S> ScriptRunner for RemoteRunner<T, S>
where
    T: Transport,
    S: Sleeper,
{
    #[instrument(skip(self, script), fields(host = %self.target.host))]
    async fn run(&self, script: &str) -> Result<String, ExecError> {
        let mut conn = connect_with_retry(&self.transport, &self.sleeper, &self.policy, &self.target)
            .await
            .map_err(|e| ExecError::connection(self.target.host.clone(), e))?;

        let result = self.run_in_session(&mut conn, script).await;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "failed to close SSH connection");
        }

        result
    }

    fn runner_type(&self) -> &'static str {
        "ssh"
    }
}
