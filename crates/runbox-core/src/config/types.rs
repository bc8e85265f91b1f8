//! Configuration type definitions for the sandbox service
//!
//! Every field has a default so an empty YAML document (or no file at all)
//! yields a working configuration: listen on `0.0.0.0:5000`, run `python3`
//! with a 30 second budget, and give each run its own directory under
//! `/workspace`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::SandboxError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Maximum accepted request body, in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    #[serde(default = "default_true")]
    pub enable_logging: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_size: default_max_body_size(),
            enable_logging: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub interpreter: InterpreterConfig,
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            interpreter: InterpreterConfig::default(),
        }
    }
}

/// How the interpreter is invoked: `<program> <args...> <script file>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Suffix of the temporary script file, including the dot.
    #[serde(default = "default_script_suffix")]
    pub script_suffix: String,
    /// Extra environment variables for the interpreter process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl InterpreterConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_script_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.script_suffix = suffix.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            script_suffix: default_script_suffix(),
            env: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root output directory, created on startup if missing.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub isolation: IsolationMode,
    /// Report files written by a run that exited non-zero.
    #[serde(default = "default_true")]
    pub report_partial_files: bool,
}

impl WorkspaceConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_partial_files(mut self, report: bool) -> Self {
        self.report_partial_files = report;
        self
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            isolation: IsolationMode::default(),
            report_partial_files: true,
        }
    }
}

/// Where a run writes its output files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    /// A fresh subdirectory of the root per run, removed after harvesting.
    /// Regular files written straight into the root are collected too.
    #[default]
    Scoped,
    /// The root itself; runs are serialized and the root is drained after each.
    Shared,
}

impl SandboxConfig {
    pub fn validate(&self) -> Result<(), SandboxError> {
        if self.execution.timeout_secs == 0 {
            return Err(SandboxError::Config(
                "Execution timeout must be greater than 0".to_string(),
            ));
        }

        if self.execution.interpreter.program.trim().is_empty() {
            return Err(SandboxError::Config(
                "Interpreter program cannot be empty".to_string(),
            ));
        }

        if self.workspace.root.as_os_str().is_empty() {
            return Err(SandboxError::Config(
                "Workspace root cannot be empty".to_string(),
            ));
        }

        if self.server.max_body_size == 0 {
            return Err(SandboxError::Config(
                "Server max_body_size must be greater than 0".to_string(),
            ));
        }

        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| {
                SandboxError::Config(format!(
                    "Invalid bind address '{}': {}",
                    self.server.bind_addr, e
                ))
            })?;

        Ok(())
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("/workspace")
}

fn default_program() -> String {
    "python3".to_string()
}

fn default_script_suffix() -> String {
    ".py".to_string()
}

fn default_max_body_size() -> usize { 10 * 1024 * 1024 }
fn default_timeout_secs() -> u64 { 30 }
fn default_true() -> bool { true }
