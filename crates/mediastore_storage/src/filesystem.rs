//! Filesystem-based storage backend.
//!
//! Objects are written under randomly generated names, fanned out into two
//! levels of subdirectories to keep directories small.

use crate::backend::verify_written;
use crate::{ContentHasher, DatastoreBackend};
use futures::StreamExt;
use mediastore_core::{ByteRange, ByteStream};
use mediastore_error::{MediaStoreResult, StorageError, StorageErrorKind};
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Attempts at finding an unused object name.
const MAX_NAME_ATTEMPTS: usize = 10;

/// Filesystem storage backend.
///
/// Stores objects at `{base_path}/{name[0:2]}/{name[2:4]}/{name[4:]}`, where
/// the location recorded in a locatable is `name`.
///
/// # Example Structure
///
/// ```text
/// /var/lib/mediastore/
/// ├── 3f/
/// │   └── a9/
/// │       └── 0c1d5e...   (object 3fa90c1d5e...)
/// └── b2/
///     └── 07/
///         └── 44e1f0...
/// ```
///
/// # Features
///
/// - **Atomic writes**: Uses temp file + rename so readers never see partial objects
/// - **Verified writes**: Hash and size are checked before the rename
/// - **Seekable ranges**: Range reads seek instead of skipping bytes
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    /// Create a new filesystem storage backend.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or accessed.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> MediaStoreResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::info!(path = %base_path.display(), "Created filesystem storage");
        Ok(Self { base_path })
    }

    /// Root directory of this backend.
    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    /// Get the filesystem path for an object name.
    ///
    /// Structure: `{base}/{name[0:2]}/{name[2:4]}/{name[4:]}`
    fn object_path(&self, location: &str) -> MediaStoreResult<PathBuf> {
        let valid = location.len() > 4 && location.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(StorageError::new(StorageErrorKind::NotFound(format!(
                "invalid object name {}",
                location
            )))
            .into());
        }
        Ok(self
            .base_path
            .join(&location[0..2])
            .join(&location[2..4])
            .join(&location[4..]))
    }

    async fn allocate_name(&self) -> MediaStoreResult<(String, PathBuf)> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = Uuid::new_v4().simple().to_string();
            let path = self.object_path(&name)?;
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok((name, path));
            }
        }
        Err(StorageError::new(StorageErrorKind::NameAllocation(format!(
            "no unused name after {} attempts",
            MAX_NAME_ATTEMPTS
        )))
        .into())
    }

    async fn open(&self, location: &str) -> MediaStoreResult<tokio::fs::File> {
        let path = self.object_path(location)?;
        tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(location.to_string())).into()
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into()
            }
        })
    }
}

#[async_trait::async_trait]
impl DatastoreBackend for FileSystemStorage {
    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[tracing::instrument(skip(self, stream))]
    async fn upload(
        &self,
        mut stream: ByteStream,
        size: u64,
        content_type: &str,
        hash: &str,
    ) -> MediaStoreResult<String> {
        let (name, path) = self.allocate_name().await?;

        // Create parent directories
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&temp_path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        let mut hasher = ContentHasher::new();
        let written: MediaStoreResult<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                hasher.update(&chunk);
                file.write_all(&chunk).await.map_err(|e| {
                    StorageError::new(StorageErrorKind::FileWrite(format!(
                        "{}: {}",
                        temp_path.display(),
                        e
                    )))
                })?;
            }
            file.flush().await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileWrite(format!(
                    "flush {}: {}",
                    temp_path.display(),
                    e
                )))
            })?;
            Ok(())
        }
        .await;
        drop(file);

        let verified = written.and_then(|()| {
            let (actual_hash, actual_size) = hasher.finish();
            verify_written(hash, size, &actual_hash, actual_size).map_err(Into::into)
        });
        if let Err(e) = verified {
            if let Err(remove_err) = tokio::fs::remove_file(&temp_path).await {
                tracing::warn!(path = %temp_path.display(), error = %remove_err, "Failed to remove rejected upload");
            }
            return Err(e);
        }

        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        tracing::info!(
            location = %name,
            path = %path.display(),
            size,
            "Stored media object"
        );
        Ok(name)
    }

    #[tracing::instrument(skip(self))]
    async fn download(&self, location: &str) -> MediaStoreResult<ByteStream> {
        let file = self.open(location).await?;
        Ok(ReaderStream::new(file).boxed())
    }

    #[tracing::instrument(skip(self))]
    async fn download_range(&self, location: &str, range: ByteRange) -> MediaStoreResult<ByteStream> {
        let mut file = self.open(location).await?;
        file.seek(SeekFrom::Start(range.start)).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!("seek {}: {}", location, e)))
        })?;
        match range.len() {
            Some(len) => Ok(ReaderStream::new(file.take(len)).boxed()),
            None => Ok(ReaderStream::new(file).boxed()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, location: &str) -> MediaStoreResult<()> {
        let path = self.object_path(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(location, path = %path.display(), "Deleted media object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(location, "Object already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "delete {}: {}",
                path.display(),
                e
            )))
            .into()),
        }
    }
}
