use crate::RepkgError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Unpacks the gzip tarball at `archive` inside `staging_dir` and moves
    /// the archive's top-level directory to `final_dir`. Nothing is ever
    /// written at `final_dir` unless extraction completed; on success the
    /// archive file is deleted.
    async fn extract(
        &self,
        archive: &Path,
        staging_dir: &Path,
        final_dir: &Path,
    ) -> Result<PathBuf, RepkgError>;
}
