use crate::ports::ArchiveFetcher;
use crate::RepkgError;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Downloads package tarballs, streaming the response body straight to disk.
/// The client enforces a bounded timeout covering the whole transfer.
pub struct HttpTarballFetcher {
    http: reqwest::Client,
}

impl HttpTarballFetcher {
    pub fn new(timeout: Duration) -> Result<Self, RepkgError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RepkgError::config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { http })
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<(), RepkgError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RepkgError::fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepkgError::FetchStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            RepkgError::fetch(url, format!("cannot create {}: {}", dest.display(), e))
        })?;

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| RepkgError::fetch(url, e.to_string()))?;
            file.write_all(&chunk).await.map_err(|e| {
                RepkgError::fetch(url, format!("cannot write {}: {}", dest.display(), e))
            })?;
        }

        file.flush().await.map_err(|e| {
            RepkgError::fetch(url, format!("cannot flush {}: {}", dest.display(), e))
        })?;

        debug!(url = %url, dest = %dest.display(), "tarball downloaded");
        Ok(())
    }
}

#[async_trait]
impl ArchiveFetcher for HttpTarballFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), RepkgError> {
        match self.stream_to_file(url, dest).await {
            Ok(()) => Ok(()),
            Err(err) => {
                // a partial download must never survive the attempt
                let _ = tokio::fs::remove_file(dest).await;
                Err(err)
            }
        }
    }
}
