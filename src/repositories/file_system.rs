use crate::models::file_system::FsError;
use crate::ports::FileSystemOperations;
use crate::RepkgError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File system adapter backed by `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem;

fn map_io(path: &Path, err: std::io::Error) -> RepkgError {
    RepkgError::FileSystem(FsError::from_io(path, &err))
}

#[async_trait]
impl FileSystemOperations for TokioFileSystem {
    async fn create_dir_all(&self, path: &Path) -> Result<(), RepkgError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), RepkgError> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| map_io(from, e))
    }

    async fn remove_file(&self, path: &Path) -> Result<(), RepkgError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), RepkgError> {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, RepkgError> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| map_io(path, e))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| map_io(path, e))? {
            paths.push(entry.path());
        }
        Ok(paths)
    }
}
