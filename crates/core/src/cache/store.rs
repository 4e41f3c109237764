//! Store abstractions shared by the resolver, the migration runner and the fetcher.
//!
//! Two independent stores back the cache:
//!
//! - a small scalar store ([`KeyValueStore`]) holding the latest-version marker
//!   and the migration cursor;
//! - a bulk content store ([`CacheStorage`]) mapping URLs to verbatim
//!   responses, grouped under named namespaces.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::Error;

/// A verbatim HTTP response as stored in the content cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawResponse {
    /// Build a response with no headers.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    /// True for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Durable scalar storage keyed by short names.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Removing an absent key is a no-op.
    async fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Durable content storage made of named response caches.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open (creating if needed) the response cache named `namespace`.
    async fn open_namespace(&self, namespace: &str) -> Result<Arc<dyn ResponseCache>, Error>;

    /// Drop a whole namespace. Returns false if it did not exist.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error>;
}

/// One namespace of the content store: `url -> RawResponse`.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn lookup(&self, url: &str) -> Result<Option<RawResponse>, Error>;

    /// Insert or replace the entry for `url`.
    async fn put(&self, url: &str, response: RawResponse) -> Result<(), Error>;

    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Returns false if there was no entry for `url`.
    async fn delete(&self, url: &str) -> Result<bool, Error>;
}

/// Content storage that refuses to open.
///
/// Stands in for the real store when it is disabled or could not be opened,
/// so every fetch degrades to a direct network request.
#[derive(Debug, Clone, Default)]
pub struct UnavailableStorage {
    reason: String,
}

impl UnavailableStorage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl CacheStorage for UnavailableStorage {
    async fn open_namespace(&self, namespace: &str) -> Result<Arc<dyn ResponseCache>, Error> {
        Err(Error::StorageUnavailable(format!("cannot open {namespace}: {}", self.reason)))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error> {
        Err(Error::StorageUnavailable(format!("cannot delete {namespace}: {}", self.reason)))
    }
}
