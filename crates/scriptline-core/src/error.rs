//! Error types for scriptline-core

use std::path::PathBuf;

use scriptline_exec::ExecError;
use thiserror::Error;

/// Script template could not be rendered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Malformed template syntax
    #[error("error parsing template: {0}")]
    Parse(String),

    /// A placeholder could not be substituted (e.g. unknown field)
    #[error("error executing template: {0}")]
    Render(String),
}

/// Configuration could not be loaded
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("failed to read config {}: {message}", .path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// I/O error message
        message: String,
    },

    /// Config is not valid TOML for the expected schema
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Config parsed but holds an unusable value
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors returned by [`crate::Installer`]
///
/// Render and execution failures are passed through untouched.
#[derive(Error, Debug, Clone)]
pub enum InstallError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Blocking runtime could not be started
    #[error("failed to start runtime: {0}")]
    Runtime(String),
}
