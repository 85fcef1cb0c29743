use crate::RepkgError;
use async_trait::async_trait;

#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Resolves the concrete version the upstream registry currently tags as
    /// `latest`. One attempt, no retries; retrying is the caller's call.
    async fn resolve_latest(&self, scope: &str, name: &str) -> Result<String, RepkgError>;
}
