use serde::Deserialize;

/// Upstream metadata document for one package, as served by the registry's
/// sidebar endpoint. Fetched transiently during version resolution, never
/// persisted.
#[derive(Deserialize, Debug, Clone)]
pub struct PackageMetadata {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(rename = "dist-tags", default)]
    pub dist_tags: DistTags,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DistTags {
    #[serde(default)]
    pub latest: Option<String>,
}

impl PackageMetadata {
    pub fn latest_version(&self) -> Option<&str> {
        self.dist_tags.latest.as_deref().filter(|v| !v.is_empty())
    }
}
