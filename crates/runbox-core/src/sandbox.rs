//! The execution pipeline: allocate → run → harvest → build result.
//!
//! [`Sandbox::execute`] is infallible by signature. Every fault raised while
//! running or harvesting is turned into a failure [`ExecutionResult`] carrying
//! the fault's description, so callers always get a result to send back.

use runbox_types::{ExecutionResult, FileMap};
use std::path::Path;
use std::sync::Arc;

use crate::config::{SandboxConfig, WorkspaceConfig};
use crate::errors::{describe_error, SandboxError};
use crate::executors::{CodeExecutor, ProcessCodeExecutor, ProcessOutcome};
use crate::harvest::OutputHarvester;
use crate::workspace::{RunWorkspace, WorkspaceManager};

pub struct Sandbox {
    executor: Arc<dyn CodeExecutor>,
    workspaces: WorkspaceManager,
    harvester: OutputHarvester,
    report_partial_files: bool,
}

impl Sandbox {
    /// Build a sandbox running the configured interpreter as a child process.
    pub fn new(config: &SandboxConfig) -> Result<Self, SandboxError> {
        config.validate()?;

        let executor = ProcessCodeExecutor::from_config(&config.execution);
        match executor.resolve_program() {
            Some(path) => log::info!("Using interpreter {}", path.display()),
            None => log::warn!(
                "Interpreter '{}' not found on PATH; executions will fail until it is installed",
                executor.interpreter().program
            ),
        }

        Self::with_executor(&config.workspace, Arc::new(executor))
    }

    pub fn with_executor(
        workspace: &WorkspaceConfig,
        executor: Arc<dyn CodeExecutor>,
    ) -> Result<Self, SandboxError> {
        Ok(Self {
            executor,
            workspaces: WorkspaceManager::new(workspace)?,
            harvester: OutputHarvester::new(),
            report_partial_files: workspace.report_partial_files,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        self.workspaces.root()
    }

    /// Run one submission and return its result.
    pub async fn execute(&self, code: &str) -> ExecutionResult {
        if code.is_empty() {
            log::warn!("Rejected submission without code");
            return ExecutionResult::no_code();
        }

        match self.try_execute(code).await {
            Ok(result) => {
                log::info!(
                    "Execution finished: success={}, {} byte(s) of output, {} file(s)",
                    result.is_success(),
                    result.output().len(),
                    result.files().map_or(0, |files| files.len())
                );
                result
            }
            Err(e) => {
                let description = describe_error(&e);
                log::error!("Execution fault: {}", description);
                ExecutionResult::fault(description)
            }
        }
    }

    async fn try_execute(&self, code: &str) -> Result<ExecutionResult, SandboxError> {
        let workspace = self.workspaces.allocate().await?;

        let run = self.executor.execute_code(code, workspace.path()).await;
        // Harvest on every branch so nothing lingers for the next run.
        let harvested = self.harvest(&workspace).await;
        workspace.release();

        let outcome = run?;
        let files = harvested?;
        Ok(self.build_result(outcome, files))
    }

    /// Collect the run's files. A scoped run also takes the regular files
    /// written straight into the root by absolute path; on a name clash the
    /// run directory's copy wins.
    async fn harvest(&self, workspace: &RunWorkspace) -> Result<FileMap, SandboxError> {
        let own = self.harvester.harvest(workspace.path()).await;
        if !workspace.is_scoped() {
            return own;
        }

        let stray = self.harvester.harvest(workspace.root()).await;
        let mut files = own?;
        for (name, content) in stray? {
            if files.contains_key(&name) {
                log::warn!("Dropping {} from the root; the run directory has its own copy", name);
                continue;
            }
            files.insert(name, content);
        }
        Ok(files)
    }

    fn build_result(&self, outcome: ProcessOutcome, files: FileMap) -> ExecutionResult {
        match outcome {
            ProcessOutcome::Completed {
                exit_code: Some(0),
                stdout,
                ..
            } => ExecutionResult::success(stdout, files),
            ProcessOutcome::Completed {
                exit_code,
                stdout,
                stderr,
            } => {
                let error = if stderr.trim().is_empty() {
                    describe_exit(exit_code)
                } else {
                    stderr
                };
                let result = ExecutionResult::failure(stdout, error);
                if self.report_partial_files {
                    result.with_partial_files(files)
                } else {
                    if !files.is_empty() {
                        log::info!("Discarding {} file(s) from failed run", files.len());
                    }
                    result
                }
            }
            ProcessOutcome::TimedOut { timeout } => {
                if !files.is_empty() {
                    log::info!(
                        "Discarding {} file(s) from run that timed out after {:?}",
                        files.len(),
                        timeout
                    );
                }
                ExecutionResult::timed_out()
            }
        }
    }
}

fn describe_exit(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("Process exited with code {}", code),
        None => "Process was terminated by a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InterpreterConfig, IsolationMode};
    use async_trait::async_trait;
    use runbox_types::{NO_CODE_MESSAGE, TIMEOUT_MESSAGE};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Writes the given files into the working directory, waits `delay`, then
    /// reports `outcome`.
    struct ScriptedExecutor {
        files: Vec<(&'static str, &'static [u8])>,
        delay: Duration,
        outcome: Result<ProcessOutcome, &'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedExecutor {
        fn new(outcome: ProcessOutcome) -> Self {
            Self {
                files: Vec::new(),
                delay: Duration::ZERO,
                outcome: Ok(outcome),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(message: &'static str) -> Self {
            Self {
                files: Vec::new(),
                delay: Duration::ZERO,
                outcome: Err(message),
                calls: AtomicUsize::new(0),
            }
        }

        fn writing(mut self, name: &'static str, content: &'static [u8]) -> Self {
            self.files.push((name, content));
            self
        }

        fn taking(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl CodeExecutor for ScriptedExecutor {
        async fn execute_code(
            &self,
            _code: &str,
            working_dir: &Path,
        ) -> Result<ProcessOutcome, SandboxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for (name, content) in &self.files {
                std::fs::write(working_dir.join(name), content)?;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.outcome {
                Ok(outcome) => Ok(outcome.clone()),
                Err(message) => Err(SandboxError::Workspace(message.to_string())),
            }
        }
    }

    fn completed(exit_code: i32, stdout: &str, stderr: &str) -> ProcessOutcome {
        ProcessOutcome::Completed {
            exit_code: Some(exit_code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    fn sandbox(base: &TempDir, executor: Arc<ScriptedExecutor>) -> Sandbox {
        Sandbox::with_executor(&WorkspaceConfig::new(base.path()), executor).unwrap()
    }

    fn assert_root_empty(sandbox: &Sandbox) {
        let leftovers: Vec<_> = std::fs::read_dir(sandbox.workspace_root())
            .unwrap()
            .collect();
        assert!(leftovers.is_empty(), "leftovers: {:?}", leftovers);
    }

    #[tokio::test]
    async fn test_empty_code_is_rejected_without_running() {
        let base = TempDir::new().unwrap();
        let executor = Arc::new(ScriptedExecutor::new(completed(0, "", "")));
        let sandbox = sandbox(&base, executor.clone());

        let result = sandbox.execute("").await;

        assert_eq!(result.error(), Some(NO_CODE_MESSAGE));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_collects_files_and_cleans_up() {
        let base = TempDir::new().unwrap();
        let executor =
            Arc::new(ScriptedExecutor::new(completed(0, "done\n", "")).writing("out.txt", b"hi"));
        let sandbox = sandbox(&base, executor);

        let result = sandbox.execute("anything").await;

        assert!(result.is_success());
        assert_eq!(result.output(), "done\n");
        assert_eq!(result.files().unwrap()["out.txt"], b"hi");
        assert_root_empty(&sandbox);
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_stderr_and_partial_files() {
        let base = TempDir::new().unwrap();
        let executor = Arc::new(
            ScriptedExecutor::new(completed(1, "halfway\n", "Traceback: boom\n"))
                .writing("partial.csv", b"a,b\n"),
        );
        let sandbox = sandbox(&base, executor);

        let result = sandbox.execute("anything").await;

        assert!(!result.is_success());
        assert_eq!(result.output(), "halfway\n");
        assert_eq!(result.error(), Some("Traceback: boom\n"));
        assert_eq!(result.files().unwrap()["partial.csv"], b"a,b\n");
        assert_root_empty(&sandbox);
    }

    #[tokio::test]
    async fn test_partial_files_can_be_dropped() {
        let base = TempDir::new().unwrap();
        let executor = Arc::new(
            ScriptedExecutor::new(completed(2, "", "err")).writing("partial.csv", b"a"),
        );
        let config = WorkspaceConfig::new(base.path()).with_partial_files(false);
        let sandbox = Sandbox::with_executor(&config, executor).unwrap();

        let result = sandbox.execute("anything").await;

        assert_eq!(result.files(), None);
        assert_root_empty(&sandbox);
    }

    #[tokio::test]
    async fn test_silent_failure_gets_exit_description() {
        let base = TempDir::new().unwrap();
        let sandbox = sandbox(&base, Arc::new(ScriptedExecutor::new(completed(7, "", "  \n"))));

        let result = sandbox.execute("anything").await;
        assert_eq!(result.error(), Some("Process exited with code 7"));

        let signalled = ProcessOutcome::Completed {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        let sandbox = Sandbox::with_executor(
            &WorkspaceConfig::new(base.path()),
            Arc::new(ScriptedExecutor::new(signalled)),
        )
        .unwrap();
        let result = sandbox.execute("anything").await;
        assert_eq!(result.error(), Some("Process was terminated by a signal"));
    }

    #[tokio::test]
    async fn test_timeout_is_exact_and_drains_files() {
        let base = TempDir::new().unwrap();
        let executor = Arc::new(
            ScriptedExecutor::new(ProcessOutcome::TimedOut {
                timeout: Duration::from_secs(30),
            })
            .writing("half.txt", b"..."),
        );
        let sandbox = sandbox(&base, executor);

        let result = sandbox.execute("anything").await;

        assert_eq!(result, ExecutionResult::timed_out());
        assert_eq!(result.error(), Some(TIMEOUT_MESSAGE));
        assert_eq!(result.output(), "");
        assert_root_empty(&sandbox);
    }

    #[tokio::test]
    async fn test_executor_fault_becomes_failure_result() {
        let base = TempDir::new().unwrap();
        let executor = Arc::new(ScriptedExecutor::failing("disk full").writing("junk", b"x"));
        let sandbox = sandbox(&base, executor);

        let result = sandbox.execute("anything").await;

        assert!(!result.is_success());
        assert_eq!(result.output(), "");
        assert!(result.error().unwrap().contains("disk full"));
        assert_eq!(result.files(), None);
        assert_root_empty(&sandbox);
    }

    #[tokio::test]
    async fn test_shared_mode_drains_root() {
        let base = TempDir::new().unwrap();
        let executor =
            Arc::new(ScriptedExecutor::new(completed(0, "", "")).writing("shared.txt", b"s"));
        let config = WorkspaceConfig::new(base.path()).with_isolation(IsolationMode::Shared);
        let sandbox = Sandbox::with_executor(&config, executor).unwrap();

        let first = sandbox.execute("anything").await;
        assert_eq!(first.files().unwrap().len(), 1);
        assert_root_empty(&sandbox);
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let base = TempDir::new().unwrap();
        let mut config = SandboxConfig::default();
        config.workspace.root = base.path().to_path_buf();
        config.execution.timeout_secs = 0;
        assert!(Sandbox::new(&config).is_err());

        config.execution.timeout_secs = 1;
        config.execution.interpreter = InterpreterConfig::new("sh");
        let sandbox = Sandbox::new(&config).unwrap();
        assert!(sandbox.workspace_root().is_dir());
    }

    #[tokio::test]
    async fn test_cancelled_run_leaves_shared_root_empty() {
        let base = TempDir::new().unwrap();
        let executor = Arc::new(
            ScriptedExecutor::new(completed(0, "", ""))
                .writing("secret.txt", b"s")
                .taking(Duration::from_secs(30)),
        );
        let config = WorkspaceConfig::new(base.path()).with_isolation(IsolationMode::Shared);
        let sandbox = Sandbox::with_executor(&config, executor.clone()).unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(200), sandbox.execute("anything")).await;
        assert!(cancelled.is_err());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert_root_empty(&sandbox);

        // the lock was released along with the abandoned run
        let quick = Sandbox::with_executor(
            &config,
            Arc::new(ScriptedExecutor::new(completed(0, "next\n", ""))),
        )
        .unwrap();
        assert_eq!(quick.execute("anything").await.output(), "next\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_default_config_returns_files_written_to_absolute_root() {
        let base = TempDir::new().unwrap();
        let executor = ProcessCodeExecutor::new(
            InterpreterConfig::new("sh").with_script_suffix(".sh"),
            Duration::from_secs(10),
        );
        let sandbox =
            Sandbox::with_executor(&WorkspaceConfig::new(base.path()), Arc::new(executor)).unwrap();
        let code = format!(
            "printf hi > '{}/out.txt'\necho ok",
            sandbox.workspace_root().display()
        );

        let result = sandbox.execute(&code).await;

        assert!(result.is_success(), "{:?}", result);
        assert_eq!(result.output(), "ok\n");
        assert_eq!(result.files().unwrap()["out.txt"], b"hi");
        assert_root_empty(&sandbox);
    }

    #[tokio::test]
    async fn test_scoped_run_prefers_its_own_copy_over_root_file() {
        let base = TempDir::new().unwrap();
        let executor =
            Arc::new(ScriptedExecutor::new(completed(0, "", "")).writing("out.txt", b"own"));
        let sandbox = sandbox(&base, executor);
        std::fs::write(sandbox.workspace_root().join("out.txt"), b"root").unwrap();
        std::fs::write(sandbox.workspace_root().join("extra.txt"), b"e").unwrap();

        let result = sandbox.execute("anything").await;

        let files = result.files().unwrap();
        assert_eq!(files["out.txt"], b"own");
        assert_eq!(files["extra.txt"], b"e");
        assert_root_empty(&sandbox);
    }
}
