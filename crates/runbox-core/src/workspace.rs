//! Output directories for individual runs
//!
//! In [`IsolationMode::Scoped`] every run gets a private `run-*` directory
//! under the root, so concurrent runs never see each other's files and the
//! directory is destroyed once harvested. In [`IsolationMode::Shared`] the
//! root itself is handed out and runs are serialized by an async mutex that
//! stays locked until the [`RunWorkspace`] is released.
//!
//! A workspace dropped without being released (its run was cancelled
//! mid-flight) deletes the regular files left directly in the root, while
//! any shared lock is still held, so nothing is handed to the next run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{Builder, TempDir};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::{IsolationMode, WorkspaceConfig};
use crate::errors::SandboxError;

pub struct WorkspaceManager {
    root: PathBuf,
    isolation: IsolationMode,
    shared_lock: Arc<Mutex<()>>,
}

impl WorkspaceManager {
    /// Create the root directory if needed and resolve it to an absolute path.
    pub fn new(config: &WorkspaceConfig) -> Result<Self, SandboxError> {
        std::fs::create_dir_all(&config.root).map_err(|e| {
            SandboxError::Workspace(format!(
                "Failed to create workspace root {}: {}",
                config.root.display(),
                e
            ))
        })?;
        let root = config.root.canonicalize().map_err(|e| {
            SandboxError::Workspace(format!(
                "Failed to resolve workspace root {}: {}",
                config.root.display(),
                e
            ))
        })?;

        log::info!(
            "Workspace root {} ({:?} isolation)",
            root.display(),
            config.isolation
        );

        Ok(Self {
            root,
            isolation: config.isolation,
            shared_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn isolation(&self) -> IsolationMode {
        self.isolation
    }

    /// Hand out the output directory for one run.
    pub async fn allocate(&self) -> Result<RunWorkspace, SandboxError> {
        match self.isolation {
            IsolationMode::Scoped => {
                // The root may have been removed underneath us since startup.
                tokio::fs::create_dir_all(&self.root).await?;
                let dir = Builder::new()
                    .prefix("run-")
                    .tempdir_in(&self.root)
                    .map_err(|e| {
                        SandboxError::Workspace(format!(
                            "Failed to create run directory in {}: {}",
                            self.root.display(),
                            e
                        ))
                    })?;
                log::debug!("Allocated run directory {}", dir.path().display());
                Ok(RunWorkspace {
                    path: dir.path().to_path_buf(),
                    root: self.root.clone(),
                    scoped: Some(dir),
                    released: false,
                    _lock: None,
                })
            }
            IsolationMode::Shared => {
                let guard = self.shared_lock.clone().lock_owned().await;
                tokio::fs::create_dir_all(&self.root).await?;
                Ok(RunWorkspace {
                    path: self.root.clone(),
                    root: self.root.clone(),
                    scoped: None,
                    released: false,
                    _lock: Some(guard),
                })
            }
        }
    }
}

/// Output directory leased to a single run.
pub struct RunWorkspace {
    path: PathBuf,
    root: PathBuf,
    scoped: Option<TempDir>,
    released: bool,
    _lock: Option<OwnedMutexGuard<()>>,
}

impl RunWorkspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The workspace root; the same as [`path`](Self::path) in shared mode.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_scoped(&self) -> bool {
        self.scoped.is_some()
    }

    /// Remove a scoped directory (with anything left in it) and release the
    /// shared lock. Dropping does the same but cannot report failures.
    pub fn release(mut self) {
        if let Some(dir) = self.scoped.take() {
            if let Err(e) = dir.close() {
                log::warn!("Failed to remove run directory {}: {}", self.path.display(), e);
            }
        }
        self.released = true;
    }

    /// Delete the regular files left directly in the root.
    fn drain_abandoned(&self) {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to list {} for cleanup: {}", self.root.display(), e);
                return;
            }
        };

        let mut removed = 0usize;
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Failed to remove {}: {}", entry.path().display(), e),
            }
        }
        log::warn!(
            "Run was abandoned before harvesting; removed {} file(s) from {}",
            removed,
            self.root.display()
        );
    }
}

impl Drop for RunWorkspace {
    fn drop(&mut self) {
        // Runs before the fields drop, so a shared lock is still held here.
        // A scoped run directory is removed by its TempDir afterwards.
        if !self.released {
            self.drain_abandoned();
        }
    }
}
