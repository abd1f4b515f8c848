//! Installer configuration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scriptline_exec::local::DEFAULT_SHELL;
use scriptline_exec::retry::{DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
use scriptline_exec::{ExecutionTarget, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::image::ImageRef;
use crate::logging::LoggingConfig;

/// Everything an installer run needs apart from the template text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Image repository to install
    pub image_repo: String,
    /// Image tag
    #[serde(default)]
    pub image_tag: String,
    /// Interpreter for local runs
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Remote host settings; absent or blank host means local
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    /// Connection retry settings
    #[serde(default)]
    pub retry: RetryConfig,
    /// Extra template fields
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

/// SSH settings for a remote run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Host address
    #[serde(default)]
    pub host: String,
    /// SSH user (defaults to root)
    #[serde(default = "default_user")]
    pub user: String,
    /// Path to SSH private key
    pub ssh_key: Option<PathBuf>,
}

fn default_user() -> String {
    "root".to_string()
}

/// Bounded retry settings for connecting to a remote host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total dial attempts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_ms() -> u64 {
    u64::try_from(DEFAULT_BACKOFF.as_millis()).unwrap_or(1000)
}

impl RetryConfig {
    /// Convert to a retry policy
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if `max_attempts` is zero
    pub fn policy(&self) -> Result<RetryPolicy, ConfigError> {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

impl InstallerConfig {
    /// Config for a local run of `image`
    pub fn new(image: ImageRef) -> Self {
        Self {
            image_repo: image.repo,
            image_tag: image.tag,
            shell: default_shell(),
            remote: None,
            retry: RetryConfig::default(),
            vars: BTreeMap::new(),
            logging: LoggingConfig::default(),
        }
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns `ConfigError` if the text is not valid TOML for this schema or
    /// holds invalid values
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: InstallerConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.image_repo.trim().is_empty() {
            return Err(ConfigError::Invalid("image_repo must not be empty".to_string()));
        }
        if self.shell.trim().is_empty() {
            return Err(ConfigError::Invalid("shell must not be empty".to_string()));
        }
        self.retry.policy()?;
        Ok(())
    }

    /// Image to install
    #[must_use]
    pub fn image(&self) -> ImageRef {
        ImageRef::new(&self.image_repo, &self.image_tag)
    }

    /// Where to run, decided by whether a remote host is set
    #[must_use]
    pub fn target(&self) -> ExecutionTarget {
        match &self.remote {
            Some(remote) => ExecutionTarget::select(
                Some(remote.host.as_str()),
                remote.user.clone(),
                remote.ssh_key.clone().unwrap_or_default(),
            ),
            None => ExecutionTarget::Local,
        }
    }
}
