//! Local/remote dispatch

use async_trait::async_trait;

use crate::error::ExecError;
use crate::local::LocalRunner;
use crate::remote::RemoteRunner;
use crate::result::ExecutionTarget;
use crate::retry::RetryPolicy;
use crate::traits::ScriptRunner;

/// The runner chosen for one execution target
#[derive(Debug, Clone)]
pub enum Runner {
    /// Subprocess on this machine
    Local(LocalRunner),
    /// SSH session on a remote host
    Remote(RemoteRunner),
}

impl Runner {
    /// Build the runner matching `target`
    ///
    /// `shell` only applies to local targets and `policy` only to remote ones.
    pub fn for_target(target: ExecutionTarget, shell: &str, policy: RetryPolicy) -> Self {
        match target {
            ExecutionTarget::Local => Runner::Local(LocalRunner::with_shell(shell)),
            ExecutionTarget::Remote(remote) => {
                Runner::Remote(RemoteRunner::new(remote).with_policy(policy))
            }
        }
    }
}

#[async_trait]
impl ScriptRunner for Runner {
    async fn run(&self, script: &str) -> Result<String, ExecError> {
        match self {
            Runner::Local(local) => local.run(script).await,
            Runner::Remote(remote) => remote.run(script).await,
        }
    }

    fn runner_type(&self) -> &'static str {
        match self {
            Runner::Local(local) => local.runner_type(),
            Runner::Remote(remote) => remote.runner_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::result::RemoteTarget;

    #[test]
    fn test_for_target_local() {
        let runner = Runner::for_target(ExecutionTarget::Local, "bash", RetryPolicy::default());

        match runner {
            Runner::Local(local) => assert_eq!(local.shell(), "bash"),
            Runner::Remote(_) => panic!("expected local runner"),
        }
    }

    #[test]
    fn test_for_target_remote_keeps_policy() {
        let policy = RetryPolicy::new(5, Duration::from_millis(250)).unwrap();
        let target = ExecutionTarget::Remote(RemoteTarget::new("/k", "ci", "gpu-01"));
        let runner = Runner::for_target(target, "sh", policy);

        assert_eq!(runner.runner_type(), "ssh");
        match runner {
            Runner::Remote(remote) => {
                assert_eq!(remote.target().host, "gpu-01");
                assert_eq!(*remote.policy(), policy);
            }
            Runner::Local(_) => panic!("expected remote runner"),
        }
    }

    #[tokio::test]
    async fn test_local_dispatch_runs_script() {
        let runner = Runner::for_target(ExecutionTarget::Local, "sh", RetryPolicy::default());
        assert_eq!(runner.run("printf abc").await.unwrap(), "abc");
    }
}
