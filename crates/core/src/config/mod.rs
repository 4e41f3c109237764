//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (GAMEDATA_*)
//! 2. TOML config file (if GAMEDATA_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::version::{LATEST_VERSION, VersionDescriptor};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (GAMEDATA_*)
/// 2. TOML config file (if GAMEDATA_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite file holding both persisted stores.
    ///
    /// Set via GAMEDATA_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Namespace of the content cache.
    ///
    /// Set via GAMEDATA_CACHE_NAMESPACE environment variable.
    #[serde(default = "default_cache_namespace")]
    pub cache_namespace: String,

    /// Root of the content source, without a trailing slash.
    ///
    /// Set via GAMEDATA_CONTENT_BASE_URL environment variable.
    #[serde(default = "default_content_base_url")]
    pub content_base_url: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via GAMEDATA_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to accept per response.
    ///
    /// Set via GAMEDATA_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Newest release the dynamic version follows.
    ///
    /// Set via GAMEDATA_LATEST_VERSION environment variable.
    #[serde(default = "default_latest_version")]
    pub latest_version: String,

    /// Known versions, oldest first.
    #[serde(default = "default_versions")]
    pub versions: Vec<VersionDescriptor>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./gamedata-cache.sqlite")
}

fn default_cache_namespace() -> String {
    "misode-v2".into()
}

fn default_content_base_url() -> String {
    "https://raw.githubusercontent.com/misode/mcmeta".into()
}

fn default_user_agent() -> String {
    "gamedata/0.1".into()
}

fn default_max_bytes() -> usize {
    64 * 1024 * 1024 // 64MB
}

fn default_latest_version() -> String {
    LATEST_VERSION.into()
}

fn default_versions() -> Vec<VersionDescriptor> {
    let mut versions: Vec<VersionDescriptor> = ["1.15", "1.16", "1.17", "1.18", "1.18.2", "1.19", "1.20"]
        .into_iter()
        .map(VersionDescriptor::pinned)
        .collect();
    versions.extend([
        VersionDescriptor::pinned("1.20.2"),
        VersionDescriptor::pinned("1.20.3").with_reference("1.20.4"),
        VersionDescriptor::pinned("1.20.5").with_reference("1.20.6"),
        VersionDescriptor::pinned("1.21").with_reference("1.21.1"),
        VersionDescriptor::pinned("1.21.2").with_reference("1.21.3"),
        VersionDescriptor::pinned("1.21.4"),
        VersionDescriptor::dynamic(LATEST_VERSION),
    ]);
    versions
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_namespace: default_cache_namespace(),
            content_base_url: default_content_base_url(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            latest_version: default_latest_version(),
            versions: default_versions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `GAMEDATA_`
    /// 2. TOML file from `GAMEDATA_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("GAMEDATA_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(
            Env::prefixed("GAMEDATA_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        ))
    }

    /// Load defaults overlaid with a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the document cannot be parsed or validation fails.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(Toml::string(toml)))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Look up a configured version by id.
    pub fn find_version(&self, id: &str) -> Option<&VersionDescriptor> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// The configured dynamic version, if any.
    pub fn dynamic_version(&self) -> Option<&VersionDescriptor> {
        self.versions.iter().find(|v| v.dynamic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./gamedata-cache.sqlite"));
        assert_eq!(config.cache_namespace, "misode-v2");
        assert_eq!(config.content_base_url, "https://raw.githubusercontent.com/misode/mcmeta");
        assert_eq!(config.user_agent, "gamedata/0.1");
        assert_eq!(config.max_bytes, 64 * 1024 * 1024);
        assert_eq!(config.latest_version, LATEST_VERSION);
    }

    #[test]
    fn test_default_versions() {
        let config = AppConfig::default();
        assert_eq!(config.versions.first().map(|v| v.id.as_str()), Some("1.15"));
        assert_eq!(config.find_version("1.20.5").map(|v| v.reference()), Some("1.20.6"));
        assert_eq!(config.dynamic_version().map(|v| v.id.as_str()), Some(LATEST_VERSION));
        assert!(config.find_version("0.1").is_none());
    }

    #[test]
    fn test_from_toml_overrides_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            cache_namespace = "test-cache"
            latest_version = "25w14a"

            [[versions]]
            id = "1.21.4"

            [[versions]]
            id = "snapshot"
            dynamic = true
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_namespace, "test-cache");
        assert_eq!(config.latest_version, "25w14a");
        assert_eq!(config.versions.len(), 2);
        assert!(config.find_version("snapshot").unwrap().dynamic);
        assert_eq!(config.user_agent, "gamedata/0.1");
    }

    #[test]
    fn test_from_toml_runs_validation() {
        let result = AppConfig::from_toml_str(r#"cache_namespace = """#);
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_namespace"));
    }
}
