//! Datastore registry and selection policy.

use crate::{
    BufferedContent, DatastoreBackend, FileSystemStorage, MemoryStorage, buffer_in_memory,
    buffer_to_file,
};
use mediastore_config::{DatastoreConfig, DatastorePolicy, DatastoreType};
use mediastore_core::{ByteRange, ByteStream, Locatable, MediaKind};
use mediastore_error::{MediaStoreResult, StorageError, StorageErrorKind};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// A configured datastore: its settings, backend and tracked usage.
pub struct Datastore {
    config: DatastoreConfig,
    backend: Arc<dyn DatastoreBackend>,
    used_bytes: AtomicU64,
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("id", &self.config.id)
            .field("backend", &self.backend.backend_name())
            .field("used_bytes", &self.used_bytes())
            .finish()
    }
}

impl Datastore {
    /// Wrap a backend under the given configuration.
    pub fn new(config: DatastoreConfig, backend: Arc<dyn DatastoreBackend>) -> Self {
        Self {
            config,
            backend,
            used_bytes: AtomicU64::new(0),
        }
    }

    /// Datastore ID recorded in locatables.
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Configuration this datastore was built from.
    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    /// Underlying backend.
    pub fn backend(&self) -> &Arc<dyn DatastoreBackend> {
        &self.backend
    }

    /// Bytes written through this process.
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes.load(Ordering::SeqCst)
    }

    fn has_room(&self) -> bool {
        self.config
            .capacity_bytes
            .is_none_or(|capacity| self.used_bytes() < capacity)
    }

    fn temp_dir(&self) -> Option<PathBuf> {
        match (&self.config.temp_path, self.config.kind) {
            (Some(path), _) => Some(path.clone()),
            (None, DatastoreType::File) => Some(std::env::temp_dir()),
            (None, DatastoreType::Memory) => None,
        }
    }

    /// Consume `stream` once into a replayable buffer, hashing it on the way.
    ///
    /// Buffers to a temp file when a temp location applies, otherwise in
    /// memory.
    #[tracing::instrument(skip(self, stream), fields(datastore = %self.config.id))]
    pub async fn buffer_temp(&self, stream: ByteStream) -> MediaStoreResult<BufferedContent> {
        match self.temp_dir() {
            Some(dir) => {
                tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                    StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                        "{}: {}",
                        dir.display(),
                        e
                    )))
                })?;
                buffer_to_file(stream, &dir).await
            }
            None => {
                tracing::warn!(
                    datastore = %self.config.id,
                    "No temp path for datastore, buffering upload in memory"
                );
                buffer_in_memory(stream).await
            }
        }
    }

    /// Store `stream` and return a locatable for it.
    #[tracing::instrument(skip(self, stream), fields(datastore = %self.config.id))]
    pub async fn upload(
        &self,
        stream: ByteStream,
        size: u64,
        content_type: &str,
        hash: &str,
    ) -> MediaStoreResult<Locatable> {
        let location = self.backend.upload(stream, size, content_type, hash).await?;
        self.used_bytes.fetch_add(size, Ordering::SeqCst);
        Ok(Locatable::new(self.config.id.clone(), location, hash))
    }

    /// Open stored bytes, optionally restricted to `range`.
    pub async fn download(
        &self,
        location: &str,
        range: Option<ByteRange>,
    ) -> MediaStoreResult<ByteStream> {
        match range {
            Some(range) => self.backend.download_range(location, range).await,
            None => self.backend.download(location).await,
        }
    }

    /// Delete stored bytes.
    #[tracing::instrument(skip(self), fields(datastore = %self.config.id))]
    pub async fn remove(&self, location: &str) -> MediaStoreResult<()> {
        self.backend.remove(location).await
    }
}

/// All configured datastores plus the policy for choosing among them.
#[derive(Debug)]
pub struct Datastores {
    stores: Vec<Arc<Datastore>>,
    policy: DatastorePolicy,
    cursor: AtomicUsize,
}

impl Datastores {
    /// Create an empty registry.
    pub fn new(policy: DatastorePolicy) -> Self {
        Self {
            stores: Vec::new(),
            policy,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Add a datastore backed by `backend`.
    pub fn with_datastore(mut self, config: DatastoreConfig, backend: Arc<dyn DatastoreBackend>) -> Self {
        self.stores.push(Arc::new(Datastore::new(config, backend)));
        self
    }

    /// Build backends for every configured datastore.
    ///
    /// # Errors
    ///
    /// Returns an error if a filesystem datastore has no path or its directory
    /// cannot be created.
    #[tracing::instrument(skip_all)]
    pub fn from_config(configs: &[DatastoreConfig], policy: DatastorePolicy) -> MediaStoreResult<Self> {
        let mut datastores = Self::new(policy);
        for config in configs {
            let backend: Arc<dyn DatastoreBackend> = match config.kind {
                DatastoreType::File => {
                    let path = config.path.clone().ok_or_else(|| {
                        StorageError::new(StorageErrorKind::InvalidConfig(format!(
                            "file datastore {} has no path",
                            config.id
                        )))
                    })?;
                    Arc::new(FileSystemStorage::new(path)?)
                }
                DatastoreType::Memory => Arc::new(MemoryStorage::new()),
            };
            tracing::info!(datastore = %config.id, backend = backend.backend_name(), "Registered datastore");
            datastores = datastores.with_datastore(config.clone(), backend);
        }
        Ok(datastores)
    }

    /// Choose a datastore for new bytes of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageErrorKind::NoDatastore`] when no datastore accepts `kind`.
    pub fn pick(&self, kind: MediaKind) -> MediaStoreResult<Arc<Datastore>> {
        let usable: Vec<&Arc<Datastore>> = self
            .stores
            .iter()
            .filter(|ds| ds.config.accepts(kind))
            .collect();
        let picked = match self.policy {
            DatastorePolicy::RoundRobin if !usable.is_empty() => {
                let n = self.cursor.fetch_add(1, Ordering::SeqCst);
                usable.get(n % usable.len()).copied()
            }
            DatastorePolicy::RoundRobin => None,
            DatastorePolicy::PrimaryWithOverflow => usable
                .iter()
                .find(|ds| ds.has_room())
                .or_else(|| usable.last())
                .copied(),
        };
        picked
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorKind::NoDatastore(kind.to_string())).into())
    }

    /// Look up a datastore by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StorageErrorKind::UnknownDatastore`] for unconfigured IDs.
    pub fn get(&self, id: &str) -> MediaStoreResult<Arc<Datastore>> {
        self.stores
            .iter()
            .find(|ds| ds.id() == id)
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorKind::UnknownDatastore(id.to_string())).into())
    }

    /// Open the bytes behind `locatable`.
    pub async fn download(
        &self,
        locatable: &Locatable,
        range: Option<ByteRange>,
    ) -> MediaStoreResult<ByteStream> {
        self.get(locatable.datastore_id())?
            .download(locatable.location(), range)
            .await
    }

    /// Delete the bytes behind `locatable`.
    pub async fn remove(&self, locatable: &Locatable) -> MediaStoreResult<()> {
        self.get(locatable.datastore_id())?
            .remove(locatable.location())
            .await
    }

    /// All datastores in configuration order.
    pub fn all(&self) -> &[Arc<Datastore>] {
        &self.stores
    }
}
