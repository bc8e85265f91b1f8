//! Collection of files produced by a run.
//!
//! The harvester takes every regular file directly inside an output
//! directory, keeps its bytes under the bare file name and deletes it, so the
//! directory is empty again before the next submission. Subdirectories and
//! other non-regular entries are left alone.

use runbox_types::FileMap;
use std::io;
use std::path::Path;
use tokio::fs;

use crate::errors::SandboxError;

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputHarvester;

impl OutputHarvester {
    pub fn new() -> Self {
        Self
    }

    /// Read and remove the files in `dir`. A missing directory yields an empty map.
    pub async fn harvest(&self, dir: &Path) -> Result<FileMap, SandboxError> {
        let mut files = FileMap::new();

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("Output directory {} does not exist", dir.display());
                return Ok(files);
            }
            Err(source) => return Err(harvest_error(dir, source)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| harvest_error(dir, source))?
        {
            let path = entry.path();
            // file_type() does not follow symlinks, so links are skipped too
            let file_type = entry
                .file_type()
                .await
                .map_err(|source| harvest_error(&path, source))?;
            if !file_type.is_file() {
                log::debug!("Skipping non-regular entry {}", path.display());
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let content = fs::read(&path)
                .await
                .map_err(|source| harvest_error(&path, source))?;
            fs::remove_file(&path)
                .await
                .map_err(|source| harvest_error(&path, source))?;

            log::debug!("Harvested {} ({} bytes)", name, content.len());
            files.insert(name, content);
        }

        if !files.is_empty() {
            log::info!("Harvested {} file(s) from {}", files.len(), dir.display());
        }
        Ok(files)
    }
}

fn harvest_error(path: &Path, source: io::Error) -> SandboxError {
    SandboxError::Harvest {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_harvest_reads_and_removes_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("out.txt"), b"hi").unwrap();
        std::fs::write(dir.path().join("data.bin"), [0u8, 159, 146, 150]).unwrap();

        let files = OutputHarvester::new().harvest(dir.path()).await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files["out.txt"], b"hi");
        assert_eq!(files["data.bin"], vec![0u8, 159, 146, 150]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_harvest_is_idempotent_on_drained_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("once.txt"), b"1").unwrap();

        let harvester = OutputHarvester::new();
        assert_eq!(harvester.harvest(dir.path()).await.unwrap().len(), 1);
        assert!(harvester.harvest(dir.path()).await.unwrap().is_empty());
        assert!(harvester.harvest(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("never-created");

        let files = OutputHarvester::new().harvest(&missing).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_subdirectories_are_not_harvested() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("inner.txt"), b"deep").unwrap();
        std::fs::write(dir.path().join("top.txt"), b"top").unwrap();

        let files = OutputHarvester::new().harvest(dir.path()).await.unwrap();

        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["top.txt"]);
        assert!(nested.join("inner.txt").exists());
    }

    #[tokio::test]
    async fn test_many_files_are_all_drained() {
        let dir = TempDir::new().unwrap();
        for i in 0..50 {
            std::fs::write(dir.path().join(format!("f{:02}.txt", i)), i.to_string()).unwrap();
        }

        let files = OutputHarvester::new().harvest(dir.path()).await.unwrap();

        assert_eq!(files.len(), 50);
        assert_eq!(files["f07.txt"], b"7");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_skipped() {
        let dir = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let secret = target.path().join("secret.txt");
        std::fs::write(&secret, b"keep out").unwrap();
        std::os::unix::fs::symlink(&secret, dir.path().join("link.txt")).unwrap();

        let files = OutputHarvester::new().harvest(dir.path()).await.unwrap();

        assert!(files.is_empty());
        assert!(secret.exists());
    }
}
