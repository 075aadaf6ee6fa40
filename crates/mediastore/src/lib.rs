//! Mediastore - content-addressed media storage
//!
//! Mediastore accepts uploads, serves local and remote-fetched downloads and
//! generates thumbnails for a federated media server. Identical content is
//! stored once, per-user quotas are enforced, quarantined content is refused
//! and hot bytes are cached.
//!
//! # Features
//!
//! - **Deduplication**: content is addressed by SHA-256 and written once
//! - **Remote fetch coalescing**: concurrent downloads of the same remote
//!   media share one fetch
//! - **Pluggable datastores**: filesystem and in-memory backends, chosen by
//!   policy per media kind
//! - **Two-phase uploads**: reserve an ID now, upload its bytes later
//! - **Thumbnails**: generated once through a pluggable decoder, then served
//!   from storage
//!
//! # Quick Start
//!
//! ```rust
//! use mediastore::{DownloadOptions, MediaStore, MediaStoreConfig, UploadRequest, bytes_stream};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MediaStoreConfig::from_toml_str(
//!     r#"
//!     server_names = ["localhost"]
//!
//!     [[datastores]]
//!     id = "memory"
//!     type = "memory"
//!     media_kinds = ["local_media", "remote_media", "thumbnails"]
//!     "#,
//! )?;
//! let store = MediaStore::in_memory(config)?;
//!
//! let request = UploadRequest::builder()
//!     .origin("localhost")
//!     .content_type("text/plain")
//!     .user_id("@alice:localhost")
//!     .build()?;
//! let record = store.upload(request, bytes_stream("hello".into())).await?;
//!
//! let outcome = store
//!     .download("localhost", record.media_id(), DownloadOptions::default())
//!     .await?;
//! assert_eq!(outcome.record.content_hash(), record.content_hash());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! Mediastore is organized as a workspace with focused crates:
//!
//! - `mediastore_error` - Error types
//! - `mediastore_core` - Records, byte streams and logging setup
//! - `mediastore_config` - Layered configuration
//! - `mediastore_interface` - Database and collaborator traits
//! - `mediastore_storage` - Datastore backends and selection
//! - `mediastore_cache` - Content cache
//! - `mediastore_database` - In-memory metadata database
//! - `mediastore_pipeline` - Upload, download and thumbnail pipelines
//!
//! This crate (`mediastore`) re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use mediastore_config::*;
pub use mediastore_core::*;
pub use mediastore_error::*;
pub use mediastore_interface::*;

pub use mediastore_cache::{CacheStats, ContentCache, MemoryCache, MemoryCacheConfig, NoopCache};
pub use mediastore_database::InMemoryMediaDatabase;
pub use mediastore_pipeline::{
    CoalescingGroup, CreatePipeline, DownloadOptions, DownloadOutcome, DownloadPipeline,
    LocalLockBackend, MediaContext, QuotaType, ThumbnailOptions, ThumbnailOutcome,
    ThumbnailPipeline, UploadLocker, UploadNotifier, UploadPipeline, UploadRequest,
    UploadRequestBuilder, WorkerPool, pick_new_dimensions,
};
pub use mediastore_storage::{
    BufferedContent, Datastore, DatastoreBackend, Datastores, FileSystemStorage, MemoryStorage,
    compute_hash,
};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The media pipelines assembled over one shared context.
///
/// Cheap to clone; clones share registries, pools and coalescing state.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct MediaStore {
    /// Shared configuration and collaborators
    context: MediaContext,
    /// Upload pipeline
    uploads: UploadPipeline,
    /// Two-phase reservation pipeline
    creates: CreatePipeline,
    /// Download pipeline
    downloads: DownloadPipeline,
    /// Thumbnail pipeline, resolving sources through `downloads`
    thumbnails: ThumbnailPipeline,
}

impl MediaStore {
    /// Assemble the pipelines over `context`.
    pub fn new(context: MediaContext) -> Self {
        let downloads = DownloadPipeline::new(context.clone());
        Self {
            uploads: UploadPipeline::new(context.clone()),
            creates: CreatePipeline::new(context.clone()),
            thumbnails: ThumbnailPipeline::with_downloads(context.clone(), downloads.clone()),
            downloads,
            context,
        }
    }

    /// Build a store from configuration, keeping metadata in `database`.
    ///
    /// Datastores are created from `config.datastores`, and the in-memory
    /// cache is installed when `config.cache.enabled` is set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid or a datastore
    /// cannot be created.
    pub fn from_config(
        config: MediaStoreConfig,
        database: Arc<dyn MediaDatabase>,
    ) -> MediaStoreResult<Self> {
        config.validate()?;
        let datastores = Datastores::from_config(&config.datastores, config.datastore_policy)?;
        let cache: Option<Arc<dyn ContentCache>> = if config.cache.enabled {
            debug!(max_size_bytes = config.cache.max_size_bytes, "Enabling memory cache");
            Some(Arc::new(MemoryCache::new(MemoryCacheConfig::from(&config.cache))))
        } else {
            None
        };
        info!(
            datastores = config.datastores.len(),
            policy = %config.datastore_policy,
            "Media store configured"
        );

        let mut context = MediaContext::new(config, database, datastores);
        if let Some(cache) = cache {
            context = context.with_cache(cache);
        }
        Ok(Self::new(context))
    }

    /// Build a store from configuration over an empty in-memory database.
    ///
    /// # Errors
    ///
    /// See [`from_config`](MediaStore::from_config).
    pub fn in_memory(config: MediaStoreConfig) -> MediaStoreResult<Self> {
        Self::from_config(config, Arc::new(InMemoryMediaDatabase::new()))
    }

    /// Store new media.
    pub async fn upload(&self, request: UploadRequest, stream: ByteStream) -> MediaStoreResult<MediaRecord> {
        self.uploads.execute(request, stream).await
    }

    /// Reserve a media ID for a later [`upload_reserved`](MediaStore::upload_reserved).
    pub async fn create(
        &self,
        origin: &str,
        user_id: &str,
        expires_in: Option<Duration>,
    ) -> MediaStoreResult<ExpiringMediaRecord> {
        self.creates.execute(origin, user_id, expires_in).await
    }

    /// Upload the bytes of a reserved media ID.
    pub async fn upload_reserved(
        &self,
        origin: &str,
        media_id: &str,
        stream: ByteStream,
        content_type: &str,
        file_name: &str,
        user_id: &str,
    ) -> MediaStoreResult<MediaRecord> {
        self.uploads
            .execute_put(origin, media_id, stream, content_type, file_name, user_id)
            .await
    }

    /// Download media, fetching it from its origin when allowed.
    pub async fn download(
        &self,
        origin: &str,
        media_id: &str,
        opts: DownloadOptions,
    ) -> MediaStoreResult<DownloadOutcome> {
        self.downloads.execute(origin, media_id, opts).await
    }

    /// Thumbnail media, generating it on first request.
    pub async fn thumbnail(
        &self,
        origin: &str,
        media_id: &str,
        opts: ThumbnailOptions,
    ) -> MediaStoreResult<ThumbnailOutcome> {
        self.thumbnails.execute(origin, media_id, opts).await
    }

    /// Start periodic maintenance, stopped by cancelling `shutdown`.
    pub fn spawn_maintenance(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        mediastore_pipeline::spawn_maintenance(self.context.clone(), shutdown)
    }
}
