use crate::RepkgError;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Downloads `url` to `dest` in one GET. After an error `dest` must not
    /// exist; after success it holds the complete archive.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), RepkgError>;
}
