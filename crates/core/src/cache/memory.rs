//! In-process stores.
//!
//! Used when the SQLite file cannot be opened (values then live only for the
//! current process) and as lightweight fixtures in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{CacheStorage, KeyValueStore, RawResponse, ResponseCache};
use crate::Error;

/// Scalar store held in memory.
#[derive(Debug, Default)]
pub struct MemoryKv {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.values.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

type Entries = Arc<RwLock<HashMap<String, RawResponse>>>;

/// Content storage held in memory.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    namespaces: RwLock<HashMap<String, Entries>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every namespace opened so far and not deleted.
    pub async fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open_namespace(&self, namespace: &str) -> Result<Arc<dyn ResponseCache>, Error> {
        let mut namespaces = self.namespaces.write().await;
        let entries = namespaces.entry(namespace.to_string()).or_default().clone();
        Ok(Arc::new(MemoryResponseCache { entries }))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error> {
        Ok(self.namespaces.write().await.remove(namespace).is_some())
    }
}

/// One namespace of a [`MemoryCacheStorage`].
#[derive(Debug, Clone)]
pub struct MemoryResponseCache {
    entries: Entries,
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn lookup(&self, url: &str) -> Result<Option<RawResponse>, Error> {
        Ok(self.entries.read().await.get(url).cloned())
    }

    async fn put(&self, url: &str, response: RawResponse) -> Result<(), Error> {
        self.entries.write().await.insert(url.to_string(), response);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let mut urls: Vec<String> = self.entries.read().await.keys().cloned().collect();
        urls.sort();
        Ok(urls)
    }

    async fn delete(&self, url: &str) -> Result<bool, Error> {
        Ok(self.entries.write().await.remove(url).is_some())
    }
}
