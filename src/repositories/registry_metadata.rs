use crate::models::config::RegistryConfig;
use crate::models::metadata::PackageMetadata;
use crate::ports::VersionResolver;
use crate::RepkgError;
use async_trait::async_trait;
use tracing::debug;

/// Queries the upstream registry's metadata endpoint to turn a package name
/// into the version tagged `latest`. The HTTP client carries a short bounded
/// timeout; a failed attempt is reported, never retried here.
pub struct RegistryMetadataClient {
    http: reqwest::Client,
    registry: RegistryConfig,
}

impl RegistryMetadataClient {
    pub fn new(registry: RegistryConfig) -> Result<Self, RepkgError> {
        let http = reqwest::Client::builder()
            .timeout(registry.resolve_timeout())
            .build()
            .map_err(|e| RepkgError::config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { http, registry })
    }
}

#[async_trait]
impl VersionResolver for RegistryMetadataClient {
    async fn resolve_latest(&self, scope: &str, name: &str) -> Result<String, RepkgError> {
        let package = format!("{}/{}", scope, name);
        let url = self.registry.metadata_url(scope, name);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RepkgError::resolution(&package, e.to_string()))?;

        if !response.status().is_success() {
            return Err(RepkgError::resolution(
                &package,
                format!("metadata endpoint returned HTTP {}", response.status()),
            ));
        }

        let metadata: PackageMetadata = response
            .json()
            .await
            .map_err(|e| RepkgError::resolution(&package, format!("malformed metadata: {}", e)))?;

        match metadata.latest_version() {
            Some(latest) => {
                debug!(package = %package, latest = %latest, "resolved latest version");
                Ok(latest.to_string())
            }
            None => Err(RepkgError::resolution(
                &package,
                "metadata has no `latest` dist-tag",
            )),
        }
    }
}
