use crate::errors::RepkgError;
use semver::Version;
use std::fmt;
use std::path::PathBuf;

/// Fully resolved identifier of one package version.
///
/// Construction validates every component, so a `PackageId` that exists can
/// be turned into filesystem paths and registry URLs without further checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageId {
    scope: String,
    name: String,
    version: String,
}

impl PackageId {
    pub fn new<S: Into<String>>(scope: S, name: S, version: S) -> Result<Self, RepkgError> {
        let scope = scope.into();
        let name = name.into();
        let version = version.into();

        Self::validate_component("scope", &scope)?;
        Self::validate_component("name", &name)?;
        Self::validate_component("version", &version)?;

        Ok(Self {
            scope,
            name,
            version,
        })
    }

    /// Rejects anything that could escape the cache root once the component
    /// is joined into a path: empty parts, dot parts, separators.
    fn validate_component(kind: &str, value: &str) -> Result<(), RepkgError> {
        if value.trim().is_empty() {
            return Err(RepkgError::validation(format!("{} cannot be empty", kind)));
        }
        if value == "." || value == ".." || value.contains("..") {
            return Err(RepkgError::validation(format!(
                "{} `{}` contains a path traversal sequence",
                kind, value
            )));
        }
        if value
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_whitespace())
        {
            return Err(RepkgError::validation(format!(
                "{} `{}` contains a forbidden character",
                kind, value
            )));
        }
        Ok(())
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Canonical key, also the single-flight coalescing key.
    pub fn canonical_key(&self) -> String {
        format!("{}/{}@{}", self.scope, self.name, self.version)
    }

    /// Cache location relative to the packages root.
    pub fn relative_dir(&self) -> PathBuf {
        PathBuf::from(&self.scope).join(format!("{}@{}", self.name, self.version))
    }

    pub fn tarball_name(&self) -> String {
        format!("{}-{}.tgz", self.name, self.version)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.scope, self.name, self.version)
    }
}

/// An inbound request before version resolution. The version is kept only
/// when it parses as a real semantic version; placeholders and junk are
/// treated as "give me latest".
///
/// Scope and name are validated at construction, before any network or
/// filesystem operation sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    scope: String,
    name: String,
    version: Option<String>,
}

impl PackageRequest {
    pub fn new<S: Into<String>>(
        scope: S,
        name: S,
        version: Option<String>,
    ) -> Result<Self, RepkgError> {
        let scope = scope.into();
        let name = name.into();

        PackageId::validate_component("scope", &scope)?;
        PackageId::validate_component("name", &name)?;

        let version = version.filter(|v| Version::parse(v).is_ok());
        Ok(Self {
            scope,
            name,
            version,
        })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn requires_resolution(&self) -> bool {
        self.version.is_none()
    }

    pub fn with_version(&self, version: &str) -> Result<PackageId, RepkgError> {
        PackageId::new(self.scope.clone(), self.name.clone(), version.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_id() {
        let id = PackageId::new("@foo", "bar", "1.2.3").unwrap();
        assert_eq!(id.canonical_key(), "@foo/bar@1.2.3");
        assert_eq!(id.relative_dir(), PathBuf::from("@foo").join("bar@1.2.3"));
        assert_eq!(id.tarball_name(), "bar-1.2.3.tgz");
        assert_eq!(id.to_string(), "@foo/bar@1.2.3");
    }

    #[test]
    fn test_empty_component_rejected() {
        assert!(PackageId::new("", "bar", "1.2.3").is_err());
        assert!(PackageId::new("@foo", "  ", "1.2.3").is_err());
        assert!(PackageId::new("@foo", "bar", "").is_err());
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(PackageId::new("..", "bar", "1.2.3").is_err());
        assert!(PackageId::new("@foo", "..", "1.2.3").is_err());
        assert!(PackageId::new("@foo", "bar", "1..2").is_err());
        assert!(PackageId::new("@foo", "a/b", "1.2.3").is_err());
        assert!(PackageId::new("@foo", "a\\b", "1.2.3").is_err());
    }

    #[test]
    fn test_rejection_is_client_error() {
        let err = PackageId::new("@foo", "..", "1.2.3").unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_request_keeps_real_version() {
        let request = PackageRequest::new("@foo", "bar", Some("1.2.3".to_string())).unwrap();
        assert_eq!(request.version(), Some("1.2.3"));
        assert!(!request.requires_resolution());
    }

    #[test]
    fn test_request_drops_placeholder_version() {
        for placeholder in ["", "-", "latest", "x"] {
            let request =
                PackageRequest::new("@foo", "bar", Some(placeholder.to_string())).unwrap();
            assert!(request.requires_resolution(), "{:?}", placeholder);
        }
    }

    #[test]
    fn test_request_rejects_bad_components() {
        assert!(PackageRequest::new("..", "bar", None).is_err());
        assert!(PackageRequest::new("@foo", "a/b", None).is_err());
        assert!(PackageRequest::new("", "bar", None).is_err());
    }

    #[test]
    fn test_request_into_id() {
        let request = PackageRequest::new("@foo", "bar", None).unwrap();
        let id = request.with_version("2.0.0").unwrap();
        assert_eq!(id.version(), "2.0.0");
    }
}
