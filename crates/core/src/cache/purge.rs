//! Bulk invalidation of content-store entries by URL predicate.

use futures_util::future::join_all;

use super::store::CacheStorage;
use crate::Error;

/// Build a predicate matching URLs that start with any of `prefixes`.
pub fn starts_with_any<S: AsRef<str>>(prefixes: &[S]) -> impl Fn(&str) -> bool + '_ {
    move |url: &str| prefixes.iter().any(|prefix| url.starts_with(prefix.as_ref()))
}

/// Delete every entry of `namespace` whose URL satisfies `predicate`.
///
/// Deletions are issued concurrently and all awaited. Returns the number of
/// entries removed, or the first error hit while opening, listing or deleting.
/// Entries whose deletion succeeded stay deleted even when another fails.
pub async fn try_purge_matching<P>(storage: &dyn CacheStorage, namespace: &str, predicate: P) -> Result<usize, Error>
where
    P: Fn(&str) -> bool,
{
    let cache = storage.open_namespace(namespace).await?;
    let targets: Vec<String> = cache.keys().await?.into_iter().filter(|url| predicate(url.as_str())).collect();

    if targets.is_empty() {
        return Ok(0);
    }

    let results = join_all(targets.iter().map(|url| cache.delete(url))).await;

    let mut deleted = 0;
    let mut first_error = None;
    for result in results {
        match result {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    tracing::debug!(namespace, deleted, "purged cache entries");
    Ok(deleted)
}

/// Delete every entry of `namespace` whose URL satisfies `predicate`.
///
/// Never fails. A storage error is logged and the purge abandoned.
pub async fn purge_matching<P>(storage: &dyn CacheStorage, namespace: &str, predicate: P)
where
    P: Fn(&str) -> bool,
{
    if let Err(e) = try_purge_matching(storage, namespace, predicate).await {
        tracing::warn!(namespace, error = %e, "failed to purge cache entries");
    }
}
