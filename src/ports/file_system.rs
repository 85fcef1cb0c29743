use crate::RepkgError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait FileSystemOperations: Send + Sync {
    async fn create_dir_all(&self, path: &Path) -> Result<(), RepkgError>;

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), RepkgError>;

    async fn remove_file(&self, path: &Path) -> Result<(), RepkgError>;

    async fn remove_dir_all(&self, path: &Path) -> Result<(), RepkgError>;

    async fn exists(&self, path: &Path) -> bool;

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, RepkgError>;
}
