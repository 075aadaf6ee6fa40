//! In-memory LRU content cache.

use crate::content::Counters;
use crate::{CacheStats, ContentCache, drain};
use bytes::{Bytes, BytesMut};
use derive_getters::Getters;
use futures::StreamExt;
use mediastore_config::CacheConfig;
use mediastore_core::{ByteRange, ByteStream};
use mediastore_error::CacheError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Cached content with expiration.
#[derive(Debug, Clone, Getters)]
pub struct CacheEntry {
    bytes: Bytes,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// Check if this entry is expired.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    /// Size of the cached content.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Configuration for the memory cache.
#[derive(
    Debug,
    Clone,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
pub struct MemoryCacheConfig {
    /// Total cached bytes before LRU eviction
    #[serde(default = "default_max_size_bytes")]
    max_size_bytes: u64,

    /// Items larger than this are never cached
    #[serde(default = "default_max_item_bytes")]
    max_item_bytes: u64,

    /// Time-to-live for cached items (seconds)
    #[serde(default = "default_ttl")]
    ttl_seconds: u64,
}

fn default_max_size_bytes() -> u64 {
    1_073_741_824
}

fn default_max_item_bytes() -> u64 {
    104_857_600
}

fn default_ttl() -> u64 {
    3600
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            max_item_bytes: default_max_item_bytes(),
            ttl_seconds: default_ttl(),
        }
    }
}

impl From<&CacheConfig> for MemoryCacheConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            max_size_bytes: config.max_size_bytes,
            max_item_bytes: config.max_item_bytes,
            ttl_seconds: config.ttl_seconds,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    access_order: Vec<String>,
    total_bytes: u64,
}

impl State {
    fn touch(&mut self, hash: &str) {
        if let Some(pos) = self.access_order.iter().position(|k| k == hash) {
            let key = self.access_order.remove(pos);
            self.access_order.push(key);
        }
    }

    fn remove(&mut self, hash: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(hash)?;
        self.total_bytes -= entry.size();
        if let Some(pos) = self.access_order.iter().position(|k| k == hash) {
            self.access_order.remove(pos);
        }
        Some(entry)
    }

    /// Evict least recently used entries until `incoming` more bytes fit.
    fn make_room(&mut self, incoming: u64, max_size: u64) -> u64 {
        let mut evicted = 0;
        while self.total_bytes + incoming > max_size {
            let Some(oldest) = self.access_order.first().cloned() else {
                break;
            };
            tracing::debug!(hash = %oldest, "Evicting LRU entry");
            self.remove(&oldest);
            evicted += 1;
        }
        evicted
    }
}

/// LRU, TTL-bounded byte cache held in process memory.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use mediastore_cache::{ContentCache, MemoryCache, MemoryCacheConfig};
/// use mediastore_core::bytes_stream;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = MemoryCache::new(MemoryCacheConfig::default());
/// cache
///     .store("abc", bytes_stream(Bytes::from_static(b"hello")), 5)
///     .await
///     .unwrap();
///
/// let hit = cache.get("abc", None).await.unwrap();
/// assert_eq!(hit, Some(Bytes::from_static(b"hello")));
/// assert_eq!(cache.stats().hits, 1);
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryCache {
    config: MemoryCacheConfig,
    state: Mutex<State>,
    counters: Counters,
}

impl MemoryCache {
    /// Create a new memory cache with configuration.
    pub fn new(config: MemoryCacheConfig) -> Self {
        tracing::debug!(
            max_size_bytes = config.max_size_bytes,
            max_item_bytes = config.max_item_bytes,
            ttl_seconds = config.ttl_seconds,
            "Creating new MemoryCache"
        );
        Self {
            config,
            state: Mutex::new(State::default()),
            counters: Counters::default(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, CacheError> {
        self.state
            .lock()
            .map_err(|_| CacheError::new("Cache state poisoned"))
    }

    /// Number of cached items.
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total cached bytes.
    pub fn total_bytes(&self) -> u64 {
        self.lock().map(|s| s.total_bytes).unwrap_or(0)
    }

    /// Remove expired entries from cache.
    pub fn cleanup_expired(&self) -> usize {
        let Ok(mut state) = self.lock() else {
            return 0;
        };
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(hash, _)| hash.clone())
            .collect();
        for hash in &expired {
            state.remove(hash);
        }
        if !expired.is_empty() {
            tracing::info!(
                removed = expired.len(),
                remaining = state.entries.len(),
                "Cleaned up expired cache entries"
            );
        }
        expired.len()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

#[async_trait::async_trait]
impl ContentCache for MemoryCache {
    #[tracing::instrument(skip(self))]
    async fn get(&self, hash: &str, range: Option<ByteRange>) -> Result<Option<Bytes>, CacheError> {
        let mut state = self.lock()?;
        let expired = match state.entries.get(hash) {
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
            Some(entry) => entry.is_expired(),
        };
        if expired {
            tracing::debug!("Cache entry expired, removing");
            state.remove(hash);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        state.touch(hash);
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        let bytes = state
            .entries
            .get(hash)
            .map(|entry| entry.bytes.clone())
            .unwrap_or_default();
        let size = bytes.len() as u64;
        Ok(Some(match range {
            Some(range) => {
                let start = range.start.min(size) as usize;
                let end = (range.end_within(size) as usize).max(start);
                bytes.slice(start..end)
            }
            None => bytes,
        }))
    }

    #[tracing::instrument(skip(self, stream))]
    async fn store(&self, hash: &str, mut stream: ByteStream, size: u64) -> Result<bool, CacheError> {
        if size > self.config.max_item_bytes || size > self.config.max_size_bytes {
            tracing::debug!("Item too large to cache, draining");
            drain(stream).await?;
            return Ok(false);
        }

        let mut buf = BytesMut::with_capacity(size as usize);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CacheError::new(format!("Cache input failed: {}", e)))?;
            buf.extend_from_slice(&chunk);
            if buf.len() as u64 > self.config.max_item_bytes {
                tracing::debug!("Item exceeded declared size, draining");
                drain(stream).await?;
                return Ok(false);
            }
        }
        let bytes = buf.freeze();

        let mut state = self.lock()?;
        state.remove(hash);
        let evicted = state.make_room(bytes.len() as u64, self.config.max_size_bytes);
        self.counters.evictions.fetch_add(evicted, Ordering::Relaxed);

        state.total_bytes += bytes.len() as u64;
        state.access_order.push(hash.to_string());
        state.entries.insert(
            hash.to_string(),
            CacheEntry {
                bytes,
                created_at: Instant::now(),
                ttl: Duration::from_secs(self.config.ttl_seconds),
            },
        );
        self.counters.stores.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(cache_size = state.entries.len(), "Stored entry in cache");
        Ok(true)
    }

    async fn remove(&self, hash: &str) -> Result<(), CacheError> {
        self.lock()?.remove(hash);
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}
