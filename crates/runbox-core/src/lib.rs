//! Isolated code execution for agent-generated programs.
//!
//! Each submission is written to a temporary script, run by a brand-new
//! interpreter process under a wall-clock budget, and followed by a harvest
//! of whatever files it left in its output directory. The result is always a
//! [`runbox_types::ExecutionResult`], whatever happened along the way.
//!
//! # Architecture Overview
//!
//! - **Execution runner** ([`executors`]): one child process per submission, timeout and kill
//! - **Workspaces** ([`workspace`]): per-run scoped directories or a serialized shared root
//! - **Output harvesting** ([`harvest`]): read, keep and delete produced files
//! - **Pipeline** ([`Sandbox`]): ties the above together and converts faults into results
//! - **Configuration** ([`config`]): YAML with defaults and `RUNBOX_*` overrides

pub mod config;
pub mod errors;
pub mod executors;
pub mod harvest;
pub mod sandbox;
pub mod workspace;

pub use config::*;
pub use errors::{describe_error, SandboxError};
pub use executors::{CodeExecutor, ProcessCodeExecutor, ProcessOutcome};
pub use harvest::OutputHarvester;
pub use sandbox::Sandbox;
pub use workspace::{RunWorkspace, WorkspaceManager};
