//! Per-process record of URLs already force-refreshed.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// URLs for which a network-first fetch was attempted during this process.
///
/// Grows monotonically and is never persisted. Owned by the fetcher, so its
/// lifetime is the lifetime of the service that created it.
#[derive(Debug, Default)]
pub struct RefreshTracker {
    refreshed: Mutex<HashSet<String>>,
}

impl RefreshTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set is only ever inserted into, so a poisoned guard is still consistent.
        self.refreshed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record `url`, returning true if this is its first refresh attempt.
    pub fn mark(&self, url: &str) -> bool {
        let mut set = self.set();
        if set.contains(url) {
            return false;
        }
        set.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.set().contains(url)
    }

    pub fn len(&self) -> usize {
        self.set().len()
    }

    pub fn is_empty(&self) -> bool {
        self.set().is_empty()
    }
}
