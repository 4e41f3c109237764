//! Long-lived data service.
//!
//! One [`DataService`] exists per process. It owns the read-through fetcher
//! (and with it the refresh tracker), the version resolver and the URL
//! layout, and is the entry point for every UI-triggered data request.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use gamedata_core::cache::{MemoryKv, MigrationRunner, UnavailableStorage};
use gamedata_core::{
    AppConfig, CacheDb, CacheStorage, Error, KeyValueStore, RawResponse, VersionDescriptor, VersionResolver,
};

use crate::decode;
use crate::fetch::{FetchConfig, Freshness, HttpTransport, ReadThroughFetcher, RefreshTracker, Transport};
use crate::source::{ContentSource, DataCategory, UrlBuilder, VersionMeta};

/// Registry name to the ids it contains.
pub type Registries = BTreeMap<String, Vec<String>>;

pub struct DataService {
    fetcher: ReadThroughFetcher,
    resolver: VersionResolver,
    source: Arc<dyn UrlBuilder>,
}

impl DataService {
    /// Assemble a service from its collaborators.
    ///
    /// The resolver runs the built-in migrations and purges the content
    /// source's floating URLs when `config.latest_version` moves.
    pub fn new(
        transport: Arc<dyn Transport>, storage: Arc<dyn CacheStorage>, kv: Arc<dyn KeyValueStore>, config: &AppConfig,
    ) -> Self {
        let source: Arc<dyn UrlBuilder> = Arc::new(ContentSource::new(&config.content_base_url));
        Self::with_source(transport, storage, kv, source, config)
    }

    pub fn with_source(
        transport: Arc<dyn Transport>, storage: Arc<dyn CacheStorage>, kv: Arc<dyn KeyValueStore>,
        source: Arc<dyn UrlBuilder>, config: &AppConfig,
    ) -> Self {
        let resolver = VersionResolver::new(kv, storage.clone(), &config.cache_namespace, &config.latest_version)
            .with_dynamic_prefixes(source.dynamic_prefixes())
            .with_migrations(MigrationRunner::with_defaults());
        let fetcher = ReadThroughFetcher::new(transport, storage, &config.cache_namespace);

        Self { fetcher, resolver, source }
    }

    /// Build the production service: reqwest transport and the SQLite stores
    /// at `config.db_path`.
    ///
    /// If the database cannot be opened the service still works: responses
    /// are fetched directly and scalars live in memory for this process.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` if the HTTP client cannot be built.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let transport = Arc::new(HttpTransport::new(FetchConfig::from(config))?);

        let (storage, kv) = match CacheDb::open(&config.db_path).await {
            Ok(db) => {
                let db = Arc::new(db);
                let storage: Arc<dyn CacheStorage> = db.clone();
                let kv: Arc<dyn KeyValueStore> = db;
                (storage, kv)
            }
            Err(e) => {
                tracing::warn!(
                    path = %config.db_path.display(),
                    error = %e,
                    "cache database unavailable, continuing without persistence"
                );
                let storage: Arc<dyn CacheStorage> = Arc::new(UnavailableStorage::new(e.to_string()));
                let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());
                (storage, kv)
            }
        };

        Ok(Self::new(transport, storage, kv, config))
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    pub fn refresh_tracker(&self) -> &RefreshTracker {
        self.fetcher.refresh_tracker()
    }

    /// Fetch `path` of `category` for `version`, cache first.
    ///
    /// # Errors
    ///
    /// Returns `Error::DataUnavailable` wrapping the migration, fetch or
    /// decode failure.
    pub async fn fetch<D, F>(
        &self, version: &VersionDescriptor, category: DataCategory, path: &str, decode: F,
    ) -> Result<D, Error>
    where
        F: Fn(&RawResponse) -> Result<D, Error>,
    {
        let what = format!("{category} {path} for {}", version.id);

        let mut version = version.clone();
        self.resolver
            .resolve(&mut version)
            .await
            .map_err(|e| Error::data_unavailable(&what, e))?;

        let url = self.source.url(&version, category, path);
        self.fetcher
            .fetch(&url, decode, Freshness::PreferCache)
            .await
            .map_err(|e| Error::data_unavailable(&what, e))
    }

    pub async fn fetch_json<D: DeserializeOwned>(
        &self, version: &VersionDescriptor, category: DataCategory, path: &str,
    ) -> Result<D, Error> {
        self.fetch(version, category, path, decode::json).await
    }

    /// Every registry listing for `version`.
    pub async fn fetch_registries(&self, version: &VersionDescriptor) -> Result<Registries, Error> {
        self.fetch_json(version, DataCategory::Summary, "registries/data.min.json")
            .await
    }

    /// A vanilla data pack file, e.g. registry `worldgen/noise` id
    /// `minecraft:cave_layer`. Ids without a namespace default to `minecraft`.
    pub async fn fetch_preset(
        &self, version: &VersionDescriptor, registry: &str, id: &str,
    ) -> Result<serde_json::Value, Error> {
        let (namespace, name) = id.split_once(':').unwrap_or(("minecraft", id));
        let path = format!("data/{namespace}/{registry}/{name}.json");
        self.fetch_json(version, DataCategory::Data, &path).await
    }

    /// The release list, refreshed from the network once per process.
    ///
    /// # Errors
    ///
    /// Returns `Error::DataUnavailable` if migrations fail, or if the network
    /// fails with nothing cached.
    pub async fn fetch_versions(&self) -> Result<Vec<VersionMeta>, Error> {
        self.resolver
            .prepare()
            .await
            .map_err(|e| Error::data_unavailable("version list", e))?;

        let url = self.source.versions_url();
        self.fetcher
            .fetch(&url, decode::json, Freshness::PreferNetwork)
            .await
            .map_err(|e| Error::data_unavailable("version list", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use async_trait::async_trait;
    use gamedata_core::cache::migrations::{CURSOR_KEY, LEGACY_NAMESPACE};
    use gamedata_core::cache::{MemoryCacheStorage, MigrationContext, MigrationStep, ResponseCache};
    use gamedata_core::version::LATEST_VERSION_KEY;
    use serde_json::json;

    const BASE: &str = "https://raw.githubusercontent.com/misode/mcmeta";

    struct Fixture {
        transport: Arc<MockTransport>,
        storage: Arc<MemoryCacheStorage>,
        kv: Arc<MemoryKv>,
        service: DataService,
    }

    fn fixture(latest: &str) -> Fixture {
        let transport = Arc::new(MockTransport::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let kv = Arc::new(MemoryKv::new());
        let config = AppConfig { latest_version: latest.to_string(), ..Default::default() };
        let service = DataService::new(transport.clone(), storage.clone(), kv.clone(), &config);
        Fixture { transport, storage, kv, service }
    }

    async fn cached_urls(storage: &MemoryCacheStorage) -> Vec<String> {
        storage.open_namespace("misode-v2").await.unwrap().keys().await.unwrap()
    }

    #[tokio::test]
    async fn test_fetch_registries_pinned() {
        let f = fixture("1.21.5");
        let url = format!("{BASE}/1.20.4-summary/registries/data.min.json");
        f.transport.respond_json(&url, json!({"block": ["stone", "dirt"]}));

        let version = VersionDescriptor::pinned("1.20.3").with_reference("1.20.4");
        let registries = f.service.fetch_registries(&version).await.unwrap();
        assert_eq!(registries["block"], vec!["stone", "dirt"]);

        f.transport.fail(&url);
        let again = f.service.fetch_registries(&version).await.unwrap();
        assert_eq!(again, registries);
        assert_eq!(f.transport.calls(&url), 1);
    }

    #[tokio::test]
    async fn test_fetch_preset_builds_data_path() {
        let f = fixture("1.21.5");
        let url = format!("{BASE}/1.21.4-data/data/minecraft/worldgen/noise/cave_layer.json");
        f.transport.respond_json(&url, json!({"firstOctave": -8}));

        let version = VersionDescriptor::pinned("1.21.4");
        let preset = f.service.fetch_preset(&version, "worldgen/noise", "cave_layer").await.unwrap();
        assert_eq!(preset["firstOctave"], -8);
        assert_eq!(f.transport.calls(&url), 1);
    }

    #[tokio::test]
    async fn test_dynamic_fetch_after_release_change_refetches() {
        let f = fixture("1.21.5");
        let url = format!("{BASE}/summary/registries/data.min.json");
        let pinned_url = format!("{BASE}/1.21.4-summary/registries/data.min.json");
        let cache = f.storage.open_namespace("misode-v2").await.unwrap();
        cache.put(&url, RawResponse::new(200, r#"{"block":["old"]}"#)).await.unwrap();
        cache.put(&pinned_url, RawResponse::new(200, r#"{"block":["pinned"]}"#)).await.unwrap();
        f.kv.set(CURSOR_KEY, "3").await.unwrap();
        f.kv.set(LATEST_VERSION_KEY, "1.21.4").await.unwrap();

        f.transport.respond_json(&url, json!({"block": ["new"]}));
        let registries = f.service.fetch_registries(&VersionDescriptor::dynamic("1.21.5")).await.unwrap();

        assert_eq!(registries["block"], vec!["new"]);
        assert_eq!(f.kv.get(LATEST_VERSION_KEY).await.unwrap().as_deref(), Some("1.21.5"));
        assert_eq!(cached_urls(&f.storage).await, vec![pinned_url, url]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_data_unavailable() {
        let f = fixture("1.21.5");
        let version = VersionDescriptor::pinned("1.21.4");

        let result = f.service.fetch_registries(&version).await;
        match result {
            Err(Error::DataUnavailable { what, source }) => {
                assert_eq!(what, "summary registries/data.min.json for 1.21.4");
                assert!(matches!(*source, Error::FetchFailed { .. }));
            }
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_versions_refreshes_once() {
        let f = fixture("1.21.5");
        let url = format!("{BASE}/summary/versions/data.min.json");
        f.transport.respond_json(&url, json!([{"id": "1.21.5", "type": "release", "stable": true}]));

        let first = f.service.fetch_versions().await.unwrap();
        f.transport.respond_json(&url, json!([{"id": "25w14a"}]));
        let second = f.service.fetch_versions().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].id, "1.21.5");
        assert_eq!(f.transport.calls(&url), 1);
        assert!(f.service.refresh_tracker().contains(&url));
    }

    #[tokio::test]
    async fn test_fetch_versions_falls_back_to_cache() {
        let f = fixture("1.21.5");
        let url = format!("{BASE}/summary/versions/data.min.json");
        let cache = f.storage.open_namespace("misode-v2").await.unwrap();
        cache.put(&url, RawResponse::new(200, r#"[{"id":"1.21.4"}]"#)).await.unwrap();
        f.transport.fail(&url);

        let versions = f.service.fetch_versions().await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].id, "1.21.4");
    }

    #[tokio::test]
    async fn test_fetch_versions_runs_migrations() {
        let f = fixture("1.21.5");
        f.kv.set("cached_mcdata_master", "{}").await.unwrap();
        f.storage.open_namespace(LEGACY_NAMESPACE).await.unwrap();
        f.transport.respond_json(&format!("{BASE}/summary/versions/data.min.json"), json!([]));

        let versions = f.service.fetch_versions().await.unwrap();

        assert!(versions.is_empty());
        assert_eq!(f.kv.get("cached_mcdata_master").await.unwrap(), None);
        assert!(!f.storage.namespaces().await.contains(&LEGACY_NAMESPACE.to_string()));
        assert_eq!(f.kv.get(CURSOR_KEY).await.unwrap().as_deref(), Some("3"));
    }

    struct Broken;

    #[async_trait]
    impl MigrationStep for Broken {
        fn description(&self) -> &str {
            "always fails"
        }

        async fn apply(&self, _ctx: &MigrationContext<'_>) -> Result<(), Error> {
            Err(Error::Serialization("corrupt".into()))
        }
    }

    #[tokio::test]
    async fn test_migration_failure_blocks_fetch() {
        let transport = Arc::new(MockTransport::new());
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());
        let runner = MigrationRunner::new(vec![gamedata_core::cache::Migration::new(1, Broken)]).unwrap();
        let resolver = VersionResolver::new(kv, storage.clone(), "misode-v2", "1.21.5").with_migrations(runner);
        let service = DataService {
            fetcher: ReadThroughFetcher::new(transport.clone(), storage, "misode-v2"),
            resolver,
            source: Arc::new(ContentSource::new(BASE)),
        };

        let result = service.fetch_versions().await;
        match result {
            Err(Error::DataUnavailable { source, .. }) => {
                assert!(matches!(*source, Error::MigrationFailed { ordinal: 1, .. }));
            }
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_from_config_degrades_without_database() {
        let config = AppConfig { db_path: "/proc/gamedata/missing/cache.sqlite".into(), ..Default::default() };
        let service = DataService::from_config(&config).await.unwrap();
        assert_eq!(service.resolver().namespace(), "misode-v2");
        assert!(service.refresh_tracker().is_empty());
    }
}
