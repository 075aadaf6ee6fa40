//! Storage backend trait.

use mediastore_core::{ByteRange, ByteStream, slice_stream};
use mediastore_error::{MediaStoreResult, StorageError, StorageErrorKind};

/// Trait for pluggable media storage backends.
///
/// Backends only move bytes; selection, buffering and bookkeeping live in
/// [`Datastore`](crate::Datastore).
#[async_trait::async_trait]
pub trait DatastoreBackend: Send + Sync {
    /// Human-readable backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Store `stream` under a fresh location and return that location.
    ///
    /// The implementation must hash the bytes as they are written and, if the
    /// digest or byte count differs from `hash` / `size`, remove the object
    /// and fail with [`StorageErrorKind::HashMismatch`] or
    /// [`StorageErrorKind::SizeMismatch`].
    async fn upload(
        &self,
        stream: ByteStream,
        size: u64,
        content_type: &str,
        hash: &str,
    ) -> MediaStoreResult<String>;

    /// Open the object at `location`.
    async fn download(&self, location: &str) -> MediaStoreResult<ByteStream>;

    /// Open the bytes of `range` within the object at `location`.
    ///
    /// The default reads from the start and discards bytes before the range.
    async fn download_range(&self, location: &str, range: ByteRange) -> MediaStoreResult<ByteStream> {
        Ok(slice_stream(self.download(location).await?, range))
    }

    /// Delete the object at `location`. Removing a missing object succeeds.
    async fn remove(&self, location: &str) -> MediaStoreResult<()>;
}

/// Compare what was written against what was declared.
pub(crate) fn verify_written(
    expected_hash: &str,
    expected_size: u64,
    actual_hash: &str,
    actual_size: u64,
) -> Result<(), StorageError> {
    if actual_size != expected_size {
        return Err(StorageError::new(StorageErrorKind::SizeMismatch {
            expected: expected_size,
            actual: actual_size,
        }));
    }
    if actual_hash != expected_hash {
        return Err(StorageError::new(StorageErrorKind::HashMismatch {
            expected: expected_hash.to_string(),
            actual: actual_hash.to_string(),
        }));
    }
    Ok(())
}
