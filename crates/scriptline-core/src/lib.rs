//! scriptline-core: Script rendering and install orchestration
//!
//! Renders a script template with an image reference and extra fields, then
//! runs it locally or over SSH through `scriptline-exec`.

pub mod config;
pub mod error;
pub mod image;
pub mod installer;
pub mod logging;
pub mod render;

pub use config::{InstallerConfig, RemoteConfig, RetryConfig};
pub use error::{ConfigError, InstallError, RenderError};
pub use image::ImageRef;
pub use installer::Installer;
pub use logging::{LogFormat, LoggingConfig};
pub use render::{ScriptParams, ScriptTemplate, render};
