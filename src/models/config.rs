use crate::errors::RepkgError;
use crate::models::package::PackageId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RepkgConfig {
    pub listen_addr: SocketAddr,
    pub shutdown_grace_secs: u64,
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
}

impl Default for RepkgConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
            shutdown_grace_secs: 5,
            registry: RegistryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl RepkgConfig {
    pub fn load(path: &Path) -> Result<Self, RepkgError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RepkgError::config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| RepkgError::config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RepkgError> {
        self.registry.validate()?;
        if self.shutdown_grace_secs == 0 {
            return Err(RepkgError::config("shutdown_grace_secs must be non-zero"));
        }
        Ok(())
    }

    pub fn with_registry<S: Into<String>>(mut self, base_url: S) -> Self {
        self.registry.base_url = base_url.into();
        self
    }

    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.cache.root_dir = root.into();
        self
    }

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    pub metadata_path: String,
    pub resolve_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4873".to_string(),
            metadata_path: "verdaccio/data/sidebar".to_string(),
            resolve_timeout_secs: 2,
            fetch_timeout_secs: 60,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), RepkgError> {
        url::Url::parse(&self.base_url).map_err(|e| {
            RepkgError::config(format!("invalid registry URL `{}`: {}", self.base_url, e))
        })?;
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(RepkgError::config(format!(
                "registry URL `{}` must be http or https",
                self.base_url
            )));
        }
        if self.resolve_timeout_secs == 0 || self.fetch_timeout_secs == 0 {
            return Err(RepkgError::config("registry timeouts must be non-zero"));
        }
        Ok(())
    }

    pub fn metadata_url(&self, scope: &str, name: &str) -> String {
        format!(
            "{}/-/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.metadata_path.trim_matches('/'),
            scope,
            name
        )
    }

    pub fn tarball_url(&self, id: &PackageId) -> String {
        format!(
            "{}/{}/{}/-/{}",
            self.base_url.trim_end_matches('/'),
            id.scope(),
            id.name(),
            id.tarball_name()
        )
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub root_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("packages"),
        }
    }
}
