//! Configuration loader for YAML files and environment overrides
//!
//! Values are layered: built-in defaults, then the YAML file (if any), then
//! `RUNBOX_*` environment variables. Command-line flags are applied on top by
//! the server binary.

use crate::config::types::*;
use crate::errors::SandboxError;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const ENV_WORKSPACE_DIR: &str = "RUNBOX_WORKSPACE_DIR";
pub const ENV_BIND_ADDR: &str = "RUNBOX_BIND_ADDR";
pub const ENV_TIMEOUT_SECS: &str = "RUNBOX_TIMEOUT_SECS";
pub const ENV_INTERPRETER: &str = "RUNBOX_INTERPRETER";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from an optional YAML file, apply environment overrides, validate.
    pub async fn load(path: Option<&Path>) -> Result<SandboxConfig, SandboxError> {
        let mut config = match path {
            Some(path) => Self::from_file(path).await?,
            None => {
                log::info!("No configuration file given, using defaults");
                SandboxConfig::default()
            }
        };

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<SandboxConfig, SandboxError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            SandboxError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        log::info!("Loaded configuration file {}", path.display());
        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string. An empty document yields defaults.
    pub fn from_str(content: &str) -> Result<SandboxConfig, SandboxError> {
        if content.trim().is_empty() {
            return Ok(SandboxConfig::default());
        }

        serde_yaml::from_str(content)
            .map_err(|e| SandboxError::Config(format!("Failed to parse YAML config: {}", e)))
    }

    /// Apply `RUNBOX_*` variables from the process environment.
    pub fn apply_env_overrides(config: &mut SandboxConfig) -> Result<(), SandboxError> {
        Self::apply_overrides_from(config, |key| env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(config: &mut SandboxConfig, lookup: F) -> Result<(), SandboxError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_WORKSPACE_DIR) {
            log::debug!("{} overrides workspace root: {}", ENV_WORKSPACE_DIR, dir);
            config.workspace.root = PathBuf::from(dir);
        }

        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            log::debug!("{} overrides bind address: {}", ENV_BIND_ADDR, addr);
            config.server.bind_addr = addr;
        }

        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            config.execution.timeout_secs = timeout.trim().parse().map_err(|e| {
                SandboxError::Config(format!(
                    "Invalid {} value '{}': {}",
                    ENV_TIMEOUT_SECS, timeout, e
                ))
            })?;
        }

        if let Some(program) = lookup(ENV_INTERPRETER) {
            log::debug!("{} overrides interpreter: {}", ENV_INTERPRETER, program);
            config.execution.interpreter.program = program;
        }

        Ok(())
    }
}
