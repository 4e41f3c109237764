//! Content source layout.
//!
//! The source publishes one branch per data category. Floating branches
//! (`summary`, `data`, ...) always track the newest release; pinned content
//! lives on `{release}-{category}` branches.

use serde::{Deserialize, Serialize};

use gamedata_core::VersionDescriptor;

/// Kind of artifact served by the content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataCategory {
    /// Pre-aggregated listings (registries, release list, block states).
    Summary,
    /// Vanilla data pack files.
    Data,
    /// Vanilla resource pack files.
    Assets,
    /// Registry listings, one file per registry.
    Registries,
}

impl DataCategory {
    pub const ALL: [DataCategory; 4] = [Self::Summary, Self::Data, Self::Assets, Self::Registries];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Data => "data",
            Self::Assets => "assets",
            Self::Registries => "registries",
        }
    }
}

impl std::fmt::Display for DataCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Maps a resolved version and a path to the URL that serves it.
pub trait UrlBuilder: Send + Sync {
    /// URL of `path` within `category` for `version`.
    fn url(&self, version: &VersionDescriptor, category: DataCategory, path: &str) -> String;

    /// URL of the release list.
    fn versions_url(&self) -> String;

    /// Prefixes of every URL whose content follows the newest release.
    fn dynamic_prefixes(&self) -> Vec<String>;
}

/// Branch-per-category layout rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct ContentSource {
    base_url: String,
}

impl ContentSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self { base_url: base_url.trim_end_matches('/').to_string() }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl UrlBuilder for ContentSource {
    fn url(&self, version: &VersionDescriptor, category: DataCategory, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if version.dynamic {
            format!("{}/{}/{path}", self.base_url, category.tag())
        } else {
            format!("{}/{}-{}/{path}", self.base_url, version.reference(), category.tag())
        }
    }

    fn versions_url(&self) -> String {
        format!("{}/summary/versions/data.min.json", self.base_url)
    }

    fn dynamic_prefixes(&self) -> Vec<String> {
        DataCategory::ALL
            .iter()
            .map(|category| format!("{}/{}/", self.base_url, category.tag()))
            .collect()
    }
}

/// One entry of the remote release list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMeta {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub release_target: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub stable: Option<bool>,
    #[serde(default)]
    pub data_version: Option<u32>,
    #[serde(default)]
    pub protocol_version: Option<u32>,
    #[serde(default)]
    pub data_pack_version: Option<u32>,
    #[serde(default)]
    pub resource_pack_version: Option<u32>,
    #[serde(default)]
    pub build_time: Option<String>,
    #[serde(default)]
    pub release_time: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
}
