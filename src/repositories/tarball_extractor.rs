use crate::ports::ArchiveExtractor;
use crate::RepkgError;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

/// Name of the single top-level directory npm tarballs are expected to carry.
const TARBALL_ROOT: &str = "package";

/// Unpacks gzip tarballs and moves the unpacked tree into its final,
/// version-qualified location. flate2 and tar are synchronous, so the unpack
/// itself runs on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct TarballExtractor;

impl TarballExtractor {
    fn unpack(archive_path: &Path, staging_dir: &Path) -> Result<(), RepkgError> {
        let tar_gz = std::fs::File::open(archive_path).map_err(|e| {
            RepkgError::extract(format!("cannot open {}: {}", archive_path.display(), e))
        })?;

        let tar = GzDecoder::new(tar_gz);
        let mut archive = Archive::new(tar);
        archive.unpack(staging_dir).map_err(|e| {
            RepkgError::extract(format!("cannot unpack {}: {}", archive_path.display(), e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl ArchiveExtractor for TarballExtractor {
    async fn extract(
        &self,
        archive: &Path,
        staging_dir: &Path,
        final_dir: &Path,
    ) -> Result<PathBuf, RepkgError> {
        let archive_path = archive.to_path_buf();
        let staging = staging_dir.to_path_buf();
        tokio::task::spawn_blocking(move || Self::unpack(&archive_path, &staging))
            .await
            .map_err(|e| RepkgError::extract(format!("extraction task failed: {}", e)))??;

        let unpacked_root = staging_dir.join(TARBALL_ROOT);
        if !tokio::fs::try_exists(&unpacked_root).await.unwrap_or(false) {
            return Err(RepkgError::extract(format!(
                "archive {} has no top-level `{}` directory",
                archive.display(),
                TARBALL_ROOT
            )));
        }

        // The final path only ever receives a complete tree.
        tokio::fs::rename(&unpacked_root, final_dir)
            .await
            .map_err(|e| {
                RepkgError::extract(format!(
                    "cannot move {} to {}: {}",
                    unpacked_root.display(),
                    final_dir.display(),
                    e
                ))
            })?;

        tokio::fs::remove_file(archive).await.map_err(|e| {
            RepkgError::extract(format!("cannot remove {}: {}", archive.display(), e))
        })?;

        debug!(dir = %final_dir.display(), "tarball extracted");
        Ok(final_dir.to_path_buf())
    }
}
