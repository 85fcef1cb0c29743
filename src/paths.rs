use crate::errors::RepkgError;
use crate::models::package::PackageId;
use crate::ports::FileSystemOperations;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Deterministic on-disk layout of the cache.
///
/// The packages root holds one directory per cached package version plus a
/// hidden `.staging` area where in-flight attempts keep their artifacts.
/// Directory existence under the root is the only persisted state.
#[derive(Debug, Clone)]
pub struct RepkgPaths {
    root: PathBuf,
}

impl RepkgPaths {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical directory of one package version; its existence means
    /// "cached".
    pub fn entry_dir(&self, id: &PackageId) -> PathBuf {
        self.root.join(id.relative_dir())
    }

    pub fn scope_dir(&self, id: &PackageId) -> PathBuf {
        self.root.join(id.scope())
    }

    pub fn staging_root(&self) -> PathBuf {
        self.root.join(".staging")
    }

    /// Fresh working directory, exclusive to one fetch-and-extract attempt.
    pub fn new_staging_dir(&self) -> PathBuf {
        self.staging_root().join(Uuid::new_v4().to_string())
    }

    pub async fn create_directories<FS: FileSystemOperations>(
        &self,
        fs: &FS,
    ) -> Result<(), RepkgError> {
        fs.create_dir_all(&self.root).await?;
        fs.create_dir_all(&self.staging_root()).await?;
        Ok(())
    }
}
