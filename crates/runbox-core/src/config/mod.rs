//! Configuration module for the sandbox service
//!
//! YAML configuration with serde defaults, environment overrides and
//! validation.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;


use crate::errors::SandboxError;
use std::path::Path;

/// Load a configuration from a YAML file, with environment overrides applied.
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<SandboxConfig, SandboxError> {
    ConfigLoader::load(Some(path.as_ref())).await
}
