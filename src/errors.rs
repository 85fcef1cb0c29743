use thiserror::Error;

use crate::models::file_system::FsError;

/// Every failure in the cache pipeline maps to one of these kinds, and each
/// kind is recoverable at the request boundary. Payloads are plain strings so
/// a result can be cloned out to coalesced callers.
#[derive(Error, Debug, Clone)]
pub enum RepkgError {
    #[error("Invalid package identifier: {0}")]
    Validation(String),

    #[error("Version resolution failed for `{package}`: {reason}")]
    Resolution { package: String, reason: String },

    #[error("Download failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Upstream returned HTTP {status} for {url}")]
    FetchStatus { status: u16, url: String },

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] FsError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RepkgError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn resolution<P: Into<String>, R: Into<String>>(package: P, reason: R) -> Self {
        Self::Resolution {
            package: package.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn extract<S: Into<String>>(msg: S) -> Self {
        Self::Extract(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// True when the failure was caused by the caller's input rather than by
    /// the upstream registry or the local disk.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
