//! Cache trait and the disabled implementation.

use bytes::Bytes;
use futures::StreamExt;
use mediastore_core::{ByteRange, ByteStream};
use mediastore_error::CacheError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Items stored
    pub stores: u64,
    /// Items evicted for space
    pub evictions: u64,
}

/// Atomic counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) stores: AtomicU64,
    pub(crate) evictions: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Write-through byte cache keyed by content hash.
#[async_trait::async_trait]
pub trait ContentCache: Send + Sync {
    /// Cached bytes for `hash`, restricted to `range` if given.
    async fn get(&self, hash: &str, range: Option<ByteRange>) -> Result<Option<Bytes>, CacheError>;

    /// Consume `stream` and cache it under `hash`.
    ///
    /// Must drain `stream` even when the item is not cached, since it is
    /// usually one side of a tee. Returns whether the item was cached.
    async fn store(&self, hash: &str, stream: ByteStream, size: u64) -> Result<bool, CacheError>;

    /// Forget `hash`.
    async fn remove(&self, hash: &str) -> Result<(), CacheError>;

    /// Hit/miss accounting.
    fn stats(&self) -> CacheStats;
}

/// Read `stream` to the end, discarding the bytes.
pub async fn drain(mut stream: ByteStream) -> Result<u64, CacheError> {
    let mut total = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| CacheError::new(format!("Cache input failed: {}", e)))?;
        total += chunk.len() as u64;
    }
    Ok(total)
}

/// Cache used when caching is disabled: stores nothing, always misses.
#[derive(Debug, Default)]
pub struct NoopCache {
    counters: Counters,
}

impl NoopCache {
    /// Create a disabled cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ContentCache for NoopCache {
    async fn get(&self, _hash: &str, _range: Option<ByteRange>) -> Result<Option<Bytes>, CacheError> {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn store(&self, _hash: &str, stream: ByteStream, _size: u64) -> Result<bool, CacheError> {
        drain(stream).await?;
        Ok(false)
    }

    async fn remove(&self, _hash: &str) -> Result<(), CacheError> {
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}
