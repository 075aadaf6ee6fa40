//! Remembers failed remote fetches so they are not retried immediately.

use mediastore_error::MediaStoreError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Failed remote fetches keyed by `(origin, media_id)`, each kept for `ttl`.
#[derive(Debug)]
pub struct FailureCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), (MediaStoreError, Instant)>>,
}

impl FailureCache {
    /// Remember failures for `ttl`. A zero TTL disables the cache.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<(String, String), (MediaStoreError, Instant)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The remembered failure for the media, if still fresh.
    pub fn get(&self, origin: &str, media_id: &str) -> Option<MediaStoreError> {
        let key = (origin.to_string(), media_id.to_string());
        let mut entries = self.entries();
        match entries.get(&key) {
            Some((err, expires)) if *expires > Instant::now() => Some(err.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Remember that fetching the media failed with `err`.
    pub fn insert(&self, origin: &str, media_id: &str, err: MediaStoreError) {
        if self.ttl.is_zero() {
            return;
        }
        let expires = Instant::now() + self.ttl;
        self.entries()
            .insert((origin.to_string(), media_id.to_string()), (err, expires));
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, (_, expires)| *expires > now);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediastore_error::{ErrorCategory, MediaErrorKind};

    #[tokio::test(start_paused = true)]
    async fn failures_expire_after_ttl() {
        let cache = FailureCache::new(Duration::from_secs(10));
        cache.insert(
            "remote.org",
            "abc",
            MediaStoreError::media(MediaErrorKind::NotFound),
        );

        let err = cache.get("remote.org", "abc").unwrap();
        assert!(err.is(ErrorCategory::NotFound));
        assert!(cache.get("remote.org", "other").is_none());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get("remote.org", "abc").is_none());
    }

    #[test]
    fn zero_ttl_remembers_nothing() {
        let cache = FailureCache::new(Duration::ZERO);
        cache.insert(
            "remote.org",
            "abc",
            MediaStoreError::media(MediaErrorKind::NotFound),
        );
        assert!(cache.get("remote.org", "abc").is_none());
    }
}
