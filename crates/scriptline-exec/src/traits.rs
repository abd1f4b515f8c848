//! Script runner trait

use async_trait::async_trait;

use crate::error::ExecError;

#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run a rendered script and return its stdout
    async fn run(&self, script: &str) -> Result<String, ExecError>;

    fn runner_type(&self) -> &'static str;
}
