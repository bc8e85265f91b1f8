//! Code execution in disposable interpreter processes.
//!
//! Each call runs the submitted code in a brand-new process with a wall-clock
//! budget. Non-zero exits and timeouts are reported as a [`ProcessOutcome`];
//! only faults of the runner itself are returned as errors.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::errors::SandboxError;

/// Environment variable pointing the interpreter at its output directory.
pub const OUTPUT_DIR_ENV: &str = "RUNBOX_OUTPUT_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process ended on its own. `exit_code` is `None` when it was
    /// terminated by a signal.
    Completed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The process outlived its budget and was killed.
    TimedOut { timeout: Duration },
}

impl ProcessOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            ProcessOutcome::Completed {
                exit_code: Some(0),
                ..
            }
        )
    }
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Run `code` with `working_dir` as the process's current and output directory.
    async fn execute_code(
        &self,
        code: &str,
        working_dir: &Path,
    ) -> Result<ProcessOutcome, SandboxError>;
}

pub mod process;

pub use process::ProcessCodeExecutor;
