//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use thiserror::Error;

/// Largest accepted `max_bytes`.
const MAX_BYTES_LIMIT: usize = 256 * 1024 * 1024;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_namespace`, `user_agent` or `latest_version` is empty
    /// - `content_base_url` is not http(s) or ends with `/`
    /// - `max_bytes` is 0 or exceeds 256MB
    /// - two versions share an id, or more than one is dynamic
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_namespace.trim().is_empty() {
            return Err(invalid("cache_namespace", "must not be empty"));
        }

        if !(self.content_base_url.starts_with("https://") || self.content_base_url.starts_with("http://")) {
            return Err(invalid("content_base_url", "must be an http(s) URL"));
        }
        if self.content_base_url.ends_with('/') {
            return Err(invalid("content_base_url", "must not end with '/'"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > MAX_BYTES_LIMIT {
            return Err(invalid("max_bytes", "must not exceed 256MB"));
        }

        if self.latest_version.trim().is_empty() {
            return Err(invalid("latest_version", "must not be empty"));
        }

        let mut seen = HashSet::new();
        for version in &self.versions {
            if !seen.insert(version.id.as_str()) {
                return Err(invalid("versions", format!("duplicate version id {}", version.id)));
            }
        }

        let dynamic = self.versions.iter().filter(|v| v.dynamic).count();
        if dynamic > 1 {
            return Err(invalid("versions", format!("{dynamic} dynamic versions, at most one allowed")));
        }

        if let Some(version) = self.dynamic_version()
            && version.reference.is_some()
        {
            tracing::warn!(
                id = %version.id,
                "dynamic version has a configured ref; it is replaced by latest_version on resolution"
            );
        }

        Ok(())
    }
}
