//! Shared state handed to every pipeline.

use crate::{
    AllowAllSpamChecker, FailureCache, LocalLockBackend, NoFederation, NoThumbnailer,
    UploadLocker, UploadNotifier, WorkerPool,
};
use mediastore_cache::{ContentCache, NoopCache};
use mediastore_config::MediaStoreConfig;
use mediastore_interface::{
    DistributedLock, FederationClient, MediaDatabase, SpamChecker, ThumbnailGenerator,
};
use mediastore_storage::Datastores;
use std::sync::Arc;
use std::time::Duration;

/// Produces candidate media IDs.
pub type MediaIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

fn random_media_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Configuration, collaborators and process-wide registries shared by the
/// pipelines.
///
/// Cheap to clone. Collaborators default to a disabled cache, no remote
/// fetching, no spam checking, no thumbnail decoders and an in-process
/// upload lock; replace them with the `with_*` methods.
#[derive(Clone, derive_getters::Getters)]
pub struct MediaContext {
    /// Loaded configuration
    config: Arc<MediaStoreConfig>,
    /// Metadata database
    database: Arc<dyn MediaDatabase>,
    /// Configured datastores
    datastores: Arc<Datastores>,
    /// Content cache
    cache: Arc<dyn ContentCache>,
    /// Remote media client
    federation: Arc<dyn FederationClient>,
    /// Spam checker consulted on every upload
    spam_checker: Arc<dyn SpamChecker>,
    /// Thumbnail decoders
    thumbnailer: Arc<dyn ThumbnailGenerator>,
    /// Upload lock
    locker: UploadLocker,
    /// Upload-done notifications
    notifier: Arc<UploadNotifier>,
    /// Pool for remote fetches
    download_pool: WorkerPool,
    /// Pool for thumbnail generation
    thumbnail_pool: WorkerPool,
    /// Recently failed remote fetches
    failures: Arc<FailureCache>,
    #[getter(skip)]
    id_generator: MediaIdGenerator,
}

impl std::fmt::Debug for MediaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaContext")
            .field("datastores", &self.datastores)
            .field("locker", &self.locker)
            .field("download_pool", &self.download_pool)
            .field("thumbnail_pool", &self.thumbnail_pool)
            .finish_non_exhaustive()
    }
}

impl MediaContext {
    /// Create a context with default collaborators.
    pub fn new(
        config: MediaStoreConfig,
        database: Arc<dyn MediaDatabase>,
        datastores: Datastores,
    ) -> Self {
        let lock: Arc<dyn DistributedLock> = Arc::new(LocalLockBackend::new());
        Self {
            locker: UploadLocker::new(Some(lock), &config.lock),
            download_pool: WorkerPool::new("download", config.downloads.num_workers),
            thumbnail_pool: WorkerPool::new("thumbnail", config.thumbnails.num_workers),
            failures: Arc::new(FailureCache::new(Duration::from_secs(
                config.downloads.failure_cache_seconds,
            ))),
            config: Arc::new(config),
            database,
            datastores: Arc::new(datastores),
            cache: Arc::new(NoopCache::new()),
            federation: Arc::new(NoFederation),
            spam_checker: Arc::new(AllowAllSpamChecker),
            thumbnailer: Arc::new(NoThumbnailer),
            notifier: Arc::new(UploadNotifier::new()),
            id_generator: Arc::new(random_media_id),
        }
    }

    /// Use `cache` for content.
    pub fn with_cache(mut self, cache: Arc<dyn ContentCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Fetch remote media through `federation`.
    pub fn with_federation(mut self, federation: Arc<dyn FederationClient>) -> Self {
        self.federation = federation;
        self
    }

    /// Check uploads with `spam_checker`.
    pub fn with_spam_checker(mut self, spam_checker: Arc<dyn SpamChecker>) -> Self {
        self.spam_checker = spam_checker;
        self
    }

    /// Render thumbnails with `thumbnailer`.
    pub fn with_thumbnailer(mut self, thumbnailer: Arc<dyn ThumbnailGenerator>) -> Self {
        self.thumbnailer = thumbnailer;
        self
    }

    /// Serialize uploads through `backend`, or not at all when `None`.
    pub fn with_lock(mut self, backend: Option<Arc<dyn DistributedLock>>) -> Self {
        self.locker = UploadLocker::new(backend, &self.config.lock);
        self
    }

    /// Draw candidate media IDs from `generator`.
    pub fn with_id_generator(mut self, generator: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.id_generator = Arc::new(generator);
        self
    }

    pub(crate) fn candidate_media_id(&self) -> String {
        (self.id_generator)()
    }

    /// Upper bound on one download or thumbnail request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.downloads.request_timeout_seconds)
    }
}
