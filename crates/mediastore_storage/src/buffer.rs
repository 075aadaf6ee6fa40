//! Replayable temporary buffers for incoming streams.

use crate::ContentHasher;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use mediastore_core::{ByteRange, ByteStream, bytes_stream};
use mediastore_error::{MediaStoreResult, StorageError, StorageErrorKind};
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

enum Backing {
    File(NamedTempFile),
    Memory(Bytes),
}

/// A stream consumed exactly once, with its hash and size, replayable from
/// the start any number of times.
///
/// Clones share the buffer; a temp file is deleted when the last clone and
/// the last stream opened from it are dropped.
#[derive(Clone)]
pub struct BufferedContent {
    hash: String,
    size: u64,
    backing: Arc<Backing>,
}

impl std::fmt::Debug for BufferedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backing = match self.backing.as_ref() {
            Backing::File(file) => format!("file:{}", file.path().display()),
            Backing::Memory(_) => "memory".to_string(),
        };
        f.debug_struct("BufferedContent")
            .field("hash", &self.hash)
            .field("size", &self.size)
            .field("backing", &backing)
            .finish()
    }
}

impl BufferedContent {
    /// SHA-256 of the buffered bytes.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Number of buffered bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Replay the whole buffer.
    pub async fn open(&self) -> MediaStoreResult<ByteStream> {
        self.open_range(ByteRange::from_start(0)).await
    }

    /// Replay the bytes of `range`.
    pub async fn open_range(&self, range: ByteRange) -> MediaStoreResult<ByteStream> {
        let start = range.start.min(self.size);
        let end = range.end_within(self.size).max(start);
        match self.backing.as_ref() {
            Backing::Memory(bytes) => Ok(bytes_stream(bytes.slice(start as usize..end as usize))),
            Backing::File(temp) => {
                let mut file = tokio::fs::File::open(temp.path()).await.map_err(|e| {
                    StorageError::new(StorageErrorKind::FileRead(format!(
                        "{}: {}",
                        temp.path().display(),
                        e
                    )))
                })?;
                file.seek(SeekFrom::Start(start)).await.map_err(|e| {
                    StorageError::new(StorageErrorKind::FileRead(format!(
                        "seek {}: {}",
                        temp.path().display(),
                        e
                    )))
                })?;
                let keep_alive = Arc::clone(&self.backing);
                let reader = ReaderStream::new(file.take(end - start));
                Ok(async_stream::stream! {
                    let _keep_alive = keep_alive;
                    for await chunk in reader {
                        yield chunk;
                    }
                }
                .boxed())
            }
        }
    }

    /// Read the whole buffer into memory.
    pub async fn to_bytes(&self) -> MediaStoreResult<Bytes> {
        match self.backing.as_ref() {
            Backing::Memory(bytes) => Ok(bytes.clone()),
            Backing::File(_) => Ok(mediastore_core::collect_bytes(self.open().await?).await?),
        }
    }

    /// True if the buffer lives in a temp file.
    pub fn is_file_backed(&self) -> bool {
        matches!(self.backing.as_ref(), Backing::File(_))
    }
}

/// Consume `stream` into a temp file under `dir`, hashing as it goes.
#[tracing::instrument(skip(stream, dir), fields(dir = %dir.display()))]
pub async fn buffer_to_file(mut stream: ByteStream, dir: &Path) -> MediaStoreResult<BufferedContent> {
    let temp = NamedTempFile::new_in(dir).map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "create temp file in {}: {}",
            dir.display(),
            e
        )))
    })?;
    let std_file = temp.reopen().map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            temp.path().display(),
            e
        )))
    })?;
    let mut file = tokio::fs::File::from_std(std_file);
    let mut hasher = ContentHasher::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        file.write_all(&chunk).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp.path().display(),
                e
            )))
        })?;
    }
    file.flush().await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "flush {}: {}",
            temp.path().display(),
            e
        )))
    })?;

    let (hash, size) = hasher.finish();
    tracing::debug!(hash = %hash, size, path = %temp.path().display(), "Buffered upload to temp file");
    Ok(BufferedContent {
        hash,
        size,
        backing: Arc::new(Backing::File(temp)),
    })
}

/// Consume `stream` into memory, hashing as it goes.
#[tracing::instrument(skip(stream))]
pub async fn buffer_in_memory(mut stream: ByteStream) -> MediaStoreResult<BufferedContent> {
    let mut buf = BytesMut::new();
    let mut hasher = ContentHasher::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        buf.extend_from_slice(&chunk);
    }
    let (hash, size) = hasher.finish();
    tracing::debug!(hash = %hash, size, "Buffered upload in memory");
    Ok(BufferedContent {
        hash,
        size,
        backing: Arc::new(Backing::Memory(buf.freeze())),
    })
}
