//! Content caching keyed by content hash.
//!
//! The cache is strictly best-effort: the pipelines log its failures and
//! fall back to the datastore, so its absence never changes correctness.

#![warn(missing_docs)]

mod content;
mod memory;

pub use content::{CacheStats, ContentCache, NoopCache, drain};
pub use memory::{CacheEntry, MemoryCache, MemoryCacheConfig, MemoryCacheConfigBuilder};
