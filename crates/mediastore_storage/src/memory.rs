//! In-process storage backend.

use crate::backend::verify_written;
use crate::{ContentHasher, DatastoreBackend};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use mediastore_core::{ByteRange, ByteStream, bytes_stream};
use mediastore_error::{MediaStoreResult, StorageError, StorageErrorKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Storage backend holding objects in process memory.
///
/// Counts successful writes so callers can observe deduplication.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Bytes>>,
    writes: AtomicU64,
}

impl MemoryStorage {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects successfully written since creation.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of objects currently stored.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// True if an object exists at `location`.
    pub async fn contains(&self, location: &str) -> bool {
        self.objects.read().await.contains_key(location)
    }

    async fn get(&self, location: &str) -> MediaStoreResult<Bytes> {
        self.objects
            .read()
            .await
            .get(location)
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(location.to_string())).into())
    }
}

#[async_trait::async_trait]
impl DatastoreBackend for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    #[tracing::instrument(skip(self, stream))]
    async fn upload(
        &self,
        mut stream: ByteStream,
        size: u64,
        content_type: &str,
        hash: &str,
    ) -> MediaStoreResult<String> {
        let mut buf = BytesMut::new();
        let mut hasher = ContentHasher::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            buf.extend_from_slice(&chunk);
        }
        let (actual_hash, actual_size) = hasher.finish();
        verify_written(hash, size, &actual_hash, actual_size)?;

        let location = Uuid::new_v4().simple().to_string();
        self.objects.write().await.insert(location.clone(), buf.freeze());
        self.writes.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(location = %location, size, "Stored media object in memory");
        Ok(location)
    }

    async fn download(&self, location: &str) -> MediaStoreResult<ByteStream> {
        Ok(bytes_stream(self.get(location).await?))
    }

    async fn download_range(&self, location: &str, range: ByteRange) -> MediaStoreResult<ByteStream> {
        let bytes = self.get(location).await?;
        let size = bytes.len() as u64;
        let start = range.start.min(size) as usize;
        let end = (range.end_within(size) as usize).max(start);
        Ok(bytes_stream(bytes.slice(start..end)))
    }

    async fn remove(&self, location: &str) -> MediaStoreResult<()> {
        self.objects.write().await.remove(location);
        Ok(())
    }
}
