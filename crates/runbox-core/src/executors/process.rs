// src/executors/process.rs
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tempfile::{Builder, NamedTempFile};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::{CodeExecutor, ProcessOutcome, OUTPUT_DIR_ENV};
use crate::config::{ExecutionConfig, InterpreterConfig};
use crate::errors::SandboxError;

/// Runs code as `<program> <args...> <script>` in a fresh child process.
pub struct ProcessCodeExecutor {
    interpreter: InterpreterConfig,
    timeout: Duration,
}

impl ProcessCodeExecutor {
    pub fn new(interpreter: InterpreterConfig, timeout: Duration) -> Self {
        Self {
            interpreter,
            timeout,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.interpreter.clone(), config.timeout())
    }

    pub fn interpreter(&self) -> &InterpreterConfig {
        &self.interpreter
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Locate the interpreter on `PATH` (or check an explicit path).
    pub fn resolve_program(&self) -> Option<PathBuf> {
        which::which(&self.interpreter.program).ok()
    }

    async fn write_script(&self, code: &str) -> Result<NamedTempFile, SandboxError> {
        let script = Builder::new()
            .prefix("runbox-")
            .suffix(&self.interpreter.script_suffix)
            .tempfile()?;
        fs::write(script.path(), code).await?;
        Ok(script)
    }

    fn build_command(&self, script: &Path, working_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.interpreter.program);
        cmd.args(&self.interpreter.args)
            .arg(script)
            .current_dir(working_dir)
            .env(OUTPUT_DIR_ENV, working_dir)
            .envs(&self.interpreter.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CodeExecutor for ProcessCodeExecutor {
    async fn execute_code(
        &self,
        code: &str,
        working_dir: &Path,
    ) -> Result<ProcessOutcome, SandboxError> {
        // Removed when dropped, whichever way this function returns.
        let script = self.write_script(code).await?;

        let mut child = self
            .build_command(script.path(), working_dir)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                program: self.interpreter.program.clone(),
                source,
            })?;
        let pid = child.id();
        log::debug!(
            "Spawned {} (pid {:?}) for {}",
            self.interpreter.program,
            pid,
            script.path().display()
        );

        let stdout = PipeCapture::spawn(child.stdout.take());
        let stderr = PipeCapture::spawn(child.stderr.take());

        // The budget covers the process only; pipes inherited by a leftover
        // background process must not hold a finished run hostage.
        let outcome = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                log::debug!("Process {:?} finished with {}", pid, status);
                let (stdout, stderr) = tokio::join!(
                    stdout.finish(PIPE_DRAIN_GRACE),
                    stderr.finish(PIPE_DRAIN_GRACE)
                );
                ProcessOutcome::Completed {
                    exit_code: status.code(),
                    stdout: String::from_utf8_lossy(&stdout?).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr?).into_owned(),
                }
            }
            Err(_) => {
                log::warn!(
                    "Execution timed out after {:?}, killing pid {:?}",
                    self.timeout,
                    pid
                );
                // kill() also reaps the child; it fails only if the process already exited.
                if let Err(e) = child.kill().await {
                    log::debug!("Kill of pid {:?} reported: {}", pid, e);
                }
                stdout.abort();
                stderr.abort();
                ProcessOutcome::TimedOut {
                    timeout: self.timeout,
                }
            }
        };

        if let Err(e) = script.close() {
            log::warn!("Failed to remove temporary script: {}", e);
        }

        Ok(outcome)
    }
}

/// How long to keep reading a pipe after the process itself has exited.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Background reader collecting a child pipe into a shared buffer.
///
/// The buffer is shared so whatever arrived before a stalled reader is
/// abandoned can still be returned.
struct PipeCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<io::Result<()>>,
}

impl PipeCapture {
    fn spawn<R: AsyncRead + Unpin + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return Ok(());
            };
            let mut chunk = [0u8; 8192];
            loop {
                let n = pipe.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(());
                }
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]);
            }
        });
        Self { buf, task }
    }

    /// Wait up to `grace` for end-of-file, then return what was read.
    async fn finish(mut self, grace: Duration) -> Result<Vec<u8>, SandboxError> {
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(joined) => joined??,
            Err(_) => {
                log::warn!(
                    "Output pipe still open {:?} after the process exited; a background process may be holding it",
                    grace
                );
                self.task.abort();
            }
        }
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(std::mem::take(&mut *buf))
    }

    fn abort(&self) {
        self.task.abort();
    }
}

impl Drop for PipeCapture {
    fn drop(&mut self) {
        // no-op for a reader that already finished
        self.task.abort();
    }
}
