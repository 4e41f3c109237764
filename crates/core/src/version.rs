//! Game versions and resolution of the floating version.
//!
//! A [`VersionDescriptor`] is either pinned to one release or dynamic, in
//! which case it follows the newest release this build knows about. Content
//! for the dynamic descriptor is fetched from floating URLs, so when the
//! embedded latest release moves, every cached entry under those URLs is
//! purged before the descriptor is pointed at the new release.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::migrations::{MigrationContext, MigrationRunner};
use crate::cache::purge::{starts_with_any, try_purge_matching};
use crate::cache::store::{CacheStorage, KeyValueStore};

/// Newest release known to this build.
pub const LATEST_VERSION: &str = "1.21.5";

/// Scalar key holding the last release observed for the dynamic descriptor.
pub const LATEST_VERSION_KEY: &str = "cached_latest_version";

/// A game version as configured by the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub id: String,

    /// Follows the newest release when true.
    #[serde(default)]
    pub dynamic: bool,

    /// Concrete release the content is fetched for.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl VersionDescriptor {
    pub fn pinned(id: impl Into<String>) -> Self {
        Self { id: id.into(), dynamic: false, reference: None }
    }

    pub fn dynamic(id: impl Into<String>) -> Self {
        Self { id: id.into(), dynamic: true, reference: None }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// The concrete release, falling back to `id`.
    pub fn reference(&self) -> &str {
        self.reference.as_deref().unwrap_or(&self.id)
    }
}

/// Runs pending migrations and keeps the dynamic descriptor current.
pub struct VersionResolver {
    kv: Arc<dyn KeyValueStore>,
    storage: Arc<dyn CacheStorage>,
    namespace: String,
    latest_version: String,
    dynamic_prefixes: Vec<String>,
    migrations: MigrationRunner,
}

impl VersionResolver {
    /// Resolver with no migrations and no dynamic prefixes.
    pub fn new(
        kv: Arc<dyn KeyValueStore>, storage: Arc<dyn CacheStorage>, namespace: impl Into<String>,
        latest_version: impl Into<String>,
    ) -> Self {
        Self {
            kv,
            storage,
            namespace: namespace.into(),
            latest_version: latest_version.into(),
            dynamic_prefixes: Vec::new(),
            migrations: MigrationRunner::default(),
        }
    }

    /// URL prefixes serving content for the dynamic descriptor.
    pub fn with_dynamic_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.dynamic_prefixes = prefixes;
        self
    }

    pub fn with_migrations(mut self, migrations: MigrationRunner) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn latest_version(&self) -> &str {
        &self.latest_version
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Apply pending migrations.
    ///
    /// # Errors
    ///
    /// Propagates `Error::MigrationFailed` from the runner.
    pub async fn prepare(&self) -> Result<(), Error> {
        let ctx = MigrationContext { kv: self.kv.as_ref(), storage: self.storage.as_ref(), namespace: &self.namespace };
        self.migrations.apply_pending(&ctx).await?;
        Ok(())
    }

    /// Bring persisted state up to date and resolve `descriptor`.
    ///
    /// For a dynamic descriptor whose recorded release differs from the
    /// embedded latest one, entries under the dynamic prefixes are purged and
    /// the marker is updated, in that order. A failed purge leaves the marker
    /// untouched so the next call retries; it is logged, not returned.
    ///
    /// # Errors
    ///
    /// Only migration failures are returned.
    pub async fn resolve(&self, descriptor: &mut VersionDescriptor) -> Result<(), Error> {
        self.prepare().await?;

        if !descriptor.dynamic {
            return Ok(());
        }

        let recorded = match self.kv.get(LATEST_VERSION_KEY).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read latest version marker");
                None
            }
        };

        if recorded.as_deref() != Some(self.latest_version.as_str()) {
            self.invalidate(recorded.as_deref()).await;
        }

        descriptor.reference = Some(self.latest_version.clone());
        Ok(())
    }

    async fn invalidate(&self, recorded: Option<&str>) {
        let purged = try_purge_matching(
            self.storage.as_ref(),
            &self.namespace,
            starts_with_any(&self.dynamic_prefixes),
        )
        .await;

        match purged {
            Ok(deleted) => {
                tracing::info!(
                    previous = recorded.unwrap_or("none"),
                    latest = %self.latest_version,
                    deleted,
                    "latest version changed, purged floating entries"
                );
                if let Err(e) = self.kv.set(LATEST_VERSION_KEY, &self.latest_version).await {
                    tracing::warn!(error = %e, "failed to record latest version marker");
                }
            }
            Err(e) => {
                tracing::warn!(
                    latest = %self.latest_version,
                    error = %e,
                    "failed to purge floating entries, will retry on next resolution"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::{MemoryCacheStorage, MemoryKv};
    use crate::cache::migrations::{CURSOR_KEY, default_migrations};
    use crate::cache::store::{RawResponse, UnavailableStorage};

    const BASE: &str = "https://raw.githubusercontent.com/misode/mcmeta";

    fn prefixes() -> Vec<String> {
        ["summary", "data", "assets", "registries"]
            .iter()
            .map(|tag| format!("{BASE}/{tag}/"))
            .collect()
    }

    async fn seed(storage: &MemoryCacheStorage) {
        let cache = storage.open_namespace("misode-v2").await.unwrap();
        for url in [
            format!("{BASE}/summary/registries/data.min.json"),
            format!("{BASE}/data/data/minecraft/loot_table/blocks/stone.json"),
            format!("{BASE}/assets/assets/minecraft/blockstates/stone.json"),
            format!("{BASE}/registries/item/data.min.json"),
            format!("{BASE}/1.20.4-summary/registries/data.min.json"),
        ] {
            cache.put(&url, RawResponse::new(200, "{}")).await.unwrap();
        }
    }

    async fn keys(storage: &MemoryCacheStorage) -> Vec<String> {
        storage.open_namespace("misode-v2").await.unwrap().keys().await.unwrap()
    }

    fn resolver(kv: Arc<MemoryKv>, storage: Arc<MemoryCacheStorage>, latest: &str) -> VersionResolver {
        VersionResolver::new(kv, storage, "misode-v2", latest).with_dynamic_prefixes(prefixes())
    }

    #[test]
    fn test_reference_falls_back_to_id() {
        assert_eq!(VersionDescriptor::pinned("1.20.4").reference(), "1.20.4");
        assert_eq!(VersionDescriptor::pinned("1.20").with_reference("1.20.1").reference(), "1.20.1");
    }

    #[test]
    fn test_descriptor_serde_uses_ref_key() {
        let parsed: VersionDescriptor = serde_json::from_str(r#"{"id":"1.21","ref":"1.21.1"}"#).unwrap();
        assert_eq!(parsed, VersionDescriptor::pinned("1.21").with_reference("1.21.1"));

        let json = serde_json::to_string(&VersionDescriptor::dynamic("1.21.5")).unwrap();
        assert_eq!(json, r#"{"id":"1.21.5","dynamic":true}"#);
    }

    #[tokio::test]
    async fn test_dynamic_version_change_purges_and_updates_marker() {
        let kv = Arc::new(MemoryKv::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        seed(&storage).await;
        kv.set(LATEST_VERSION_KEY, "A").await.unwrap();

        let resolver = resolver(kv.clone(), storage.clone(), "B");
        let mut descriptor = VersionDescriptor::dynamic("latest");
        resolver.resolve(&mut descriptor).await.unwrap();

        assert_eq!(descriptor.reference(), "B");
        assert_eq!(kv.get(LATEST_VERSION_KEY).await.unwrap().as_deref(), Some("B"));
        assert_eq!(keys(&storage).await, vec![format!("{BASE}/1.20.4-summary/registries/data.min.json")]);

        // Unchanged release: nothing is purged.
        let cache = storage.open_namespace("misode-v2").await.unwrap();
        cache
            .put(&format!("{BASE}/summary/registries/data.min.json"), RawResponse::new(200, "{}"))
            .await
            .unwrap();
        let mut again = VersionDescriptor::dynamic("latest");
        resolver.resolve(&mut again).await.unwrap();
        assert_eq!(again.reference(), "B");
        assert_eq!(keys(&storage).await.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_marker_counts_as_changed() {
        let kv = Arc::new(MemoryKv::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        seed(&storage).await;

        let resolver = resolver(kv.clone(), storage.clone(), "1.21.5");
        let mut descriptor = VersionDescriptor::dynamic("1.21.5");
        resolver.resolve(&mut descriptor).await.unwrap();

        assert_eq!(keys(&storage).await.len(), 1);
        assert_eq!(kv.get(LATEST_VERSION_KEY).await.unwrap().as_deref(), Some("1.21.5"));
    }

    #[tokio::test]
    async fn test_pinned_version_is_untouched() {
        let kv = Arc::new(MemoryKv::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        seed(&storage).await;
        kv.set(LATEST_VERSION_KEY, "A").await.unwrap();

        let resolver = resolver(kv.clone(), storage.clone(), "B");
        let mut descriptor = VersionDescriptor::pinned("1.20.4");
        resolver.resolve(&mut descriptor).await.unwrap();

        assert_eq!(descriptor.reference, None);
        assert_eq!(descriptor.reference(), "1.20.4");
        assert_eq!(kv.get(LATEST_VERSION_KEY).await.unwrap().as_deref(), Some("A"));
        assert_eq!(keys(&storage).await.len(), 5);
    }

    #[tokio::test]
    async fn test_failed_purge_keeps_marker() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(LATEST_VERSION_KEY, "A").await.unwrap();

        let resolver = VersionResolver::new(kv.clone(), Arc::new(UnavailableStorage::new("disabled")), "misode-v2", "B")
            .with_dynamic_prefixes(prefixes());
        let mut descriptor = VersionDescriptor::dynamic("latest");
        resolver.resolve(&mut descriptor).await.unwrap();

        assert_eq!(descriptor.reference(), "B");
        assert_eq!(kv.get(LATEST_VERSION_KEY).await.unwrap().as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_resolve_runs_migrations_first() {
        let kv = Arc::new(MemoryKv::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        kv.set("cache_1.17", "{}").await.unwrap();

        let runner = MigrationRunner::new(default_migrations()).unwrap();
        let resolver = resolver(kv.clone(), storage, "1.21.5").with_migrations(runner);
        let mut descriptor = VersionDescriptor::pinned("1.20.4");
        resolver.resolve(&mut descriptor).await.unwrap();

        assert!(kv.get("cache_1.17").await.unwrap().is_none());
        assert_eq!(kv.get(CURSOR_KEY).await.unwrap().as_deref(), Some("3"));
    }
}
