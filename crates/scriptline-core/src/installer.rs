//! Render-then-run orchestration

use scriptline_exec::{ExecutionTarget, RemoteTarget, RetryPolicy, Runner, ScriptRunner};
use tracing::{error, info, instrument};

use crate::config::InstallerConfig;
use crate::error::{ConfigError, InstallError};
use crate::render::{ScriptParams, render};

/// Renders one script and runs it on one target
///
/// The result of a successful run is thrown away; callers only learn
/// whether the install worked.
#[derive(Debug, Clone)]
pub struct Installer {
    template: String,
    params: ScriptParams,
    target: ExecutionTarget,
    shell: String,
    retry: RetryPolicy,
}

impl Installer {
    /// Create an installer that runs `template` locally for `image`
    pub fn new(template: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            params: ScriptParams::new(image),
            target: ExecutionTarget::Local,
            shell: scriptline_exec::local::DEFAULT_SHELL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Create an installer from loaded configuration
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the retry settings are unusable
    pub fn from_config(
        config: &InstallerConfig,
        template: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let mut params = ScriptParams::new(config.image().to_string());
        for (name, value) in &config.vars {
            params.insert(name, value);
        }

        Ok(Self {
            template: template.into(),
            params,
            target: config.target(),
            shell: config.shell.clone(),
            retry: config.retry.policy()?,
        })
    }

    /// Run on a remote host instead; a blank host keeps the run local
    #[must_use]
    pub fn with_remote(
        mut self,
        key_path: impl Into<std::path::PathBuf>,
        user: impl Into<String>,
        host: &str,
    ) -> Self {
        self.target = ExecutionTarget::select(Some(host), user, key_path);
        self
    }

    /// Run on an explicit target
    #[must_use]
    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.target = target;
        self
    }

    /// Add a template field
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Interpreter for local runs
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Connection retry policy for remote runs
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Where the script will run
    pub fn target(&self) -> &ExecutionTarget {
        &self.target
    }

    /// Remote host, if any
    pub fn remote(&self) -> Option<&RemoteTarget> {
        match &self.target {
            ExecutionTarget::Remote(remote) => Some(remote),
            ExecutionTarget::Local => None,
        }
    }

    /// Template fields
    pub fn params(&self) -> &ScriptParams {
        &self.params
    }

    /// Render the script without running it
    ///
    /// # Errors
    /// Returns `InstallError::Render` if the template is malformed or
    /// references an unknown field
    pub fn render(&self) -> Result<String, InstallError> {
        Ok(render(&self.template, &self.params)?)
    }

    /// Render the script and run it on the configured target
    ///
    /// # Errors
    /// Returns the render or execution error unchanged
    pub async fn install(&self) -> Result<(), InstallError> {
        let runner = Runner::for_target(self.target.clone(), &self.shell, self.retry);
        self.install_with(&runner).await
    }

    /// Render the script and run it with a caller-supplied runner
    ///
    /// # Errors
    /// Returns the render or execution error unchanged
    #[instrument(skip_all, fields(target = %self.target.describe(), runner = runner.runner_type()))]
    pub async fn install_with<R>(&self, runner: &R) -> Result<(), InstallError>
    where
        R: ScriptRunner + ?Sized,
    {
        let script = self.render()?;

        info!(image = ?self.params.image(), "running install script");
        match runner.run(&script).await {
            Ok(_) => {
                info!("install script succeeded");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "install script failed");
                Err(e.into())
            }
        }
    }

    /// Blocking form of [`Installer::install`] for callers without a runtime
    ///
    /// # Errors
    /// Returns `InstallError::Runtime` if called from inside a tokio runtime
    /// or if no runtime can be started, else the same errors as `install`
    pub fn install_blocking(&self) -> Result<(), InstallError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(InstallError::Runtime(
                "install_blocking called from within an async runtime; use install().await"
                    .to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| InstallError::Runtime(e.to_string()))?;
        runtime.block_on(self.install())
    }
}
