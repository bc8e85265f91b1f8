//! Writing returned files next to the caller.

use anyhow::{Context, Result};
use runbox_types::ExecutionResult;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Write every file carried by `result` into `dir` under its bare name,
/// overwriting existing files. Returns the paths written.
///
/// Any directory part of a returned name is dropped, so a name can never
/// point outside `dir`. Names without a final component (`""`, `..`) are
/// skipped.
pub async fn save_files(result: &ExecutionResult, dir: &Path) -> Result<Vec<PathBuf>> {
    let Some(files) = result.files() else {
        return Ok(Vec::new());
    };

    let mut written = Vec::with_capacity(files.len());
    for (name, content) in files {
        let Some(bare) = Path::new(name).file_name() else {
            log::warn!("Skipping returned file with unusable name {:?}", name);
            continue;
        };

        let path = dir.join(bare);
        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::debug!("Saved {} ({} bytes)", path.display(), content.len());
        written.push(path);
    }

    Ok(written)
}
