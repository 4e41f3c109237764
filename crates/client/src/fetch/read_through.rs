//! Read-through fetching over the content store.
//!
//! Routes each request by [`Freshness`]:
//!
//! - `PreferCache`: an ok cached entry is decoded without touching the
//!   network; otherwise the network response is decoded, stored verbatim and
//!   returned.
//! - `PreferNetwork`: the network is tried first and the cached entry is only
//!   a fallback. Each URL is refreshed at most once per process; later
//!   requests for it are downgraded to `PreferCache`.
//!
//! If the content store cannot be opened at all, every request becomes a
//! direct network fetch.

use std::sync::Arc;

use gamedata_core::{CacheStorage, Error, RawResponse, ResponseCache};

use super::Transport;
use super::refresh::RefreshTracker;

/// Freshness requirement for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Serve from the cache when possible.
    #[default]
    PreferCache,

    /// Hit the network first, at most once per URL per process, and fall back
    /// to the cache if that fails.
    PreferNetwork,
}

impl Freshness {
    pub fn is_refresh(&self) -> bool {
        matches!(self, Self::PreferNetwork)
    }
}

impl From<bool> for Freshness {
    fn from(refresh: bool) -> Self {
        if refresh { Self::PreferNetwork } else { Self::PreferCache }
    }
}

/// Result of one network attempt.
#[derive(Debug)]
pub enum NetworkOutcome {
    /// A response with an ok status.
    Success(RawResponse),
    /// Transport error or non-ok status.
    NetworkFailed(Error),
}

/// Cache-aware fetcher shared by every data request of a process.
pub struct ReadThroughFetcher {
    transport: Arc<dyn Transport>,
    storage: Arc<dyn CacheStorage>,
    namespace: String,
    refreshed: RefreshTracker,
}

impl ReadThroughFetcher {
    pub fn new(transport: Arc<dyn Transport>, storage: Arc<dyn CacheStorage>, namespace: impl Into<String>) -> Self {
        Self { transport, storage, namespace: namespace.into(), refreshed: RefreshTracker::new() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn refresh_tracker(&self) -> &RefreshTracker {
        &self.refreshed
    }

    /// Fetch `url` and decode it.
    ///
    /// The network request, when one is made, completes before the cache
    /// write, and the cache write completes before this returns. `decode`
    /// borrows the response; the stored copy shares its body.
    ///
    /// # Errors
    ///
    /// Returns `Error::FetchFailed` when the network fails and no ok cached
    /// entry can stand in, or the decode error of the response that was used.
    pub async fn fetch<D, F>(&self, url: &str, decode: F, freshness: Freshness) -> Result<D, Error>
    where
        F: Fn(&RawResponse) -> Result<D, Error>,
    {
        let freshness = match freshness {
            Freshness::PreferNetwork if !self.refreshed.mark(url) => {
                tracing::debug!(url, "already refreshed this session, preferring cache");
                Freshness::PreferCache
            }
            other => other,
        };

        let cache = match self.storage.open_namespace(&self.namespace).await {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!(namespace = %self.namespace, error = %e, "failed to open cache, fetching directly");
                return self.fetch_uncached(url, &decode).await;
            }
        };

        let cached = self.lookup(cache.as_ref(), url).await;

        match freshness {
            Freshness::PreferCache => {
                if let Some(response) = cached {
                    match decode(&response) {
                        Ok(data) => {
                            tracing::debug!(url, "cache hit");
                            return Ok(data);
                        }
                        Err(e) => tracing::debug!(url, error = %e, "cached entry failed to decode, refetching"),
                    }
                }

                match self.request(url).await {
                    NetworkOutcome::Success(response) => self.decode_and_store(cache.as_ref(), url, response, &decode).await,
                    NetworkOutcome::NetworkFailed(e) => Err(Error::fetch_failed(url, e)),
                }
            }
            Freshness::PreferNetwork => match self.request(url).await {
                NetworkOutcome::Success(response) => self.decode_and_store(cache.as_ref(), url, response, &decode).await,
                NetworkOutcome::NetworkFailed(e) => match cached {
                    Some(response) => {
                        tracing::warn!(url, error = %e, "cannot refresh, using cached response");
                        decode(&response)
                    }
                    None => Err(Error::fetch_failed(url, e)),
                },
            },
        }
    }

    /// Attempt the network once, classifying non-ok statuses as failures.
    pub async fn request(&self, url: &str) -> NetworkOutcome {
        match self.transport.get(url).await {
            Ok(response) if response.is_ok() => NetworkOutcome::Success(response),
            Ok(response) => NetworkOutcome::NetworkFailed(Error::HttpStatus { url: url.to_string(), status: response.status }),
            Err(e) => NetworkOutcome::NetworkFailed(e),
        }
    }

    /// Cached entry for `url` if present and ok. Lookup errors count as a miss.
    async fn lookup(&self, cache: &dyn ResponseCache, url: &str) -> Option<RawResponse> {
        match cache.lookup(url).await {
            Ok(Some(response)) if response.is_ok() => Some(response),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(url, error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn decode_and_store<D, F>(
        &self, cache: &dyn ResponseCache, url: &str, response: RawResponse, decode: &F,
    ) -> Result<D, Error>
    where
        F: Fn(&RawResponse) -> Result<D, Error>,
    {
        let data = decode(&response)?;

        if let Err(e) = cache.put(url, response).await {
            tracing::warn!(url, error = %e, "failed to store response in cache");
        }

        Ok(data)
    }

    async fn fetch_uncached<D, F>(&self, url: &str, decode: &F) -> Result<D, Error>
    where
        F: Fn(&RawResponse) -> Result<D, Error>,
    {
        match self.request(url).await {
            NetworkOutcome::Success(response) => decode(&response),
            NetworkOutcome::NetworkFailed(e) => Err(Error::fetch_failed(url, e)),
        }
    }
}
