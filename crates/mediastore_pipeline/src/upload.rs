//! Upload pipeline.

use crate::MediaContext;
use crate::steps::access::upload_done;
use crate::steps::collaborator_error;
use crate::steps::dedup::{ExistingContent, find_record};
use crate::steps::media_id::generate_media_id;
use crate::steps::persist::store_buffered;
use crate::steps::quota;
use crate::tee::{TEE_CAPACITY, tee};
use chrono::Utc;
use mediastore_core::{ByteStream, MediaKind, MediaRecord, ReservationState, limit_stream};
use mediastore_error::{MediaError, MediaErrorKind, MediaStoreError, MediaStoreResult};
use mediastore_interface::SpamMetadata;
use mediastore_storage::{BufferedContent, Datastore};
use tracing::{debug, info, instrument, warn};

/// What is being uploaded, apart from its bytes.
///
/// # Examples
///
/// ```
/// use mediastore_core::MediaKind;
/// use mediastore_pipeline::UploadRequest;
///
/// let request = UploadRequest::builder()
///     .origin("example.org")
///     .content_type("image/png")
///     .file_name("cat.png")
///     .user_id("@alice:example.org")
///     .build()
///     .unwrap();
/// assert_eq!(request.kind, MediaKind::LocalMedia);
/// assert!(request.media_id.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, derive_builder::Builder)]
#[builder(setter(into))]
pub struct UploadRequest {
    /// Origin the media is stored under
    pub origin: String,
    /// ID to store under; generated when absent
    #[builder(default, setter(into, strip_option))]
    pub media_id: Option<String>,
    /// Declared MIME type
    pub content_type: String,
    /// Declared filename
    #[builder(default)]
    pub file_name: String,
    /// Uploading user, empty for remote media
    #[builder(default)]
    pub user_id: String,
    /// Where the bytes came from
    #[builder(default = "MediaKind::LocalMedia")]
    pub kind: MediaKind,
}

impl UploadRequest {
    /// Creates a new request builder.
    pub fn builder() -> UploadRequestBuilder {
        UploadRequestBuilder::default()
    }
}

/// Stores new media: limits, spam checks, deduplicates and persists it.
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    ctx: MediaContext,
}

impl UploadPipeline {
    /// Create an upload pipeline over `ctx`.
    pub fn new(ctx: MediaContext) -> Self {
        Self { ctx }
    }

    /// Store `stream` as described by `request`.
    ///
    /// Identical bytes with identical metadata from the same user return the
    /// existing record when no ID was supplied. Identical bytes otherwise
    /// share the stored object of the earlier upload.
    ///
    /// A supplied `media_id` must be a live reservation held by
    /// `request.user_id`; the reservation is consumed by the upload.
    ///
    /// # Errors
    ///
    /// `AlreadyUploaded`, `Expired` or `WrongUser` for a supplied ID that
    /// cannot be claimed, then `TooLarge`, `Quarantined` (including spam),
    /// `QuotaExceeded`, `LockTimeout`, or the datastore or database failure
    /// that stopped the upload.
    #[instrument(
        skip(self, request, stream),
        fields(origin = %request.origin, kind = %request.kind, user_id = %request.user_id)
    )]
    pub async fn execute(&self, request: UploadRequest, stream: ByteStream) -> MediaStoreResult<MediaRecord> {
        let claimed = match &request.media_id {
            Some(media_id) => {
                self.check_claim(&request.origin, media_id, &request.user_id).await?;
                Some(media_id.clone())
            }
            None => None,
        };
        let origin = request.origin.clone();

        let (record, _) = self.execute_buffered(request, stream).await?;
        info!(mxc = %record.mxc(), hash = record.content_hash(), "Stored upload");

        if let Some(media_id) = claimed {
            debug!(mxc = %record.mxc(), state = %ReservationState::Claimed, "Reservation claimed");
            if let Err(e) = self.ctx.database().delete_expiring(&origin, &media_id).await {
                warn!(origin = %origin, media_id = %media_id, error = %e, "Failed to delete claimed reservation");
            }
        }
        Ok(record)
    }

    /// Claim a two-phase reservation by uploading its bytes.
    ///
    /// # Errors
    ///
    /// See [`execute`](UploadPipeline::execute).
    #[instrument(skip(self, stream, content_type, file_name))]
    pub async fn execute_put(
        &self,
        origin: &str,
        media_id: &str,
        stream: ByteStream,
        content_type: &str,
        file_name: &str,
        user_id: &str,
    ) -> MediaStoreResult<MediaRecord> {
        let request = UploadRequest {
            origin: origin.to_string(),
            media_id: Some(media_id.to_string()),
            content_type: content_type.to_string(),
            file_name: file_name.to_string(),
            user_id: user_id.to_string(),
            kind: MediaKind::LocalMedia,
        };
        self.execute(request, stream).await
    }

    /// Fail unless `user_id` holds a live reservation for `media_id` that has
    /// no content yet.
    async fn check_claim(&self, origin: &str, media_id: &str, user_id: &str) -> MediaStoreResult<()> {
        let db = self.ctx.database();
        if db.media_id_exists(origin, media_id).await? {
            return Err(MediaStoreError::media(MediaErrorKind::AlreadyUploaded));
        }

        let Some(reservation) = db.get_expiring(origin, media_id).await? else {
            return Err(MediaStoreError::media(MediaErrorKind::Expired));
        };
        match reservation.state_at(Utc::now()) {
            ReservationState::Expired => Err(MediaStoreError::media(MediaErrorKind::Expired)),
            _ if reservation.user_id != user_id => {
                Err(MediaStoreError::media(MediaErrorKind::WrongUser))
            }
            _ => Ok(()),
        }
    }

    /// Run the upload and hand back the buffered bytes along with the record,
    /// so callers can replay them without reading the datastore.
    pub(crate) async fn execute_buffered(
        &self,
        request: UploadRequest,
        stream: ByteStream,
    ) -> MediaStoreResult<(MediaRecord, BufferedContent)> {
        let ctx = &self.ctx;

        let stream = if request.kind.is_local() {
            limit_stream(stream, ctx.config().uploads.max_size_bytes)
        } else {
            stream
        };

        let (media_id, explicit_id) = match &request.media_id {
            Some(media_id) => (media_id.clone(), true),
            None => (generate_media_id(ctx, &request.origin).await?, false),
        };

        let datastore = ctx.datastores().pick(request.kind)?;

        let metadata = SpamMetadata::new(
            request.origin.as_str(),
            media_id.as_str(),
            request.user_id.as_str(),
            request.content_type.as_str(),
            request.file_name.as_str(),
        );
        let (to_buffer, to_spam_checker) = tee(stream, TEE_CAPACITY);
        let (buffered, spam) = tokio::join!(
            datastore.buffer_temp(to_buffer),
            ctx.spam_checker().check_for_spam(to_spam_checker, &metadata),
        );
        let buffered = buffered?;
        match spam {
            Ok(false) => {}
            Ok(true) => {
                warn!(media_id, hash = buffered.hash(), "Upload rejected as spam");
                return Err(MediaStoreError::media(MediaErrorKind::Quarantined));
            }
            Err(e) => return Err(collaborator_error("spam checker", e)),
        }

        if ctx.database().is_hash_quarantined(buffered.hash()).await? {
            debug!(hash = buffered.hash(), "Upload matches quarantined content");
            return Err(MediaStoreError::media(MediaErrorKind::Quarantined));
        }

        if !request.user_id.is_empty() {
            quota::can_upload(ctx, &request.user_id, buffered.size()).await?;
        }

        let lock = ctx.locker().lock(buffered.hash()).await?;
        let stored = self
            .store_locked(&request, &media_id, explicit_id, &datastore, &buffered)
            .await;
        lock.release().await;

        Ok((stored?, buffered))
    }

    /// Deduplicate or persist while holding the upload lock for the hash.
    async fn store_locked(
        &self,
        request: &UploadRequest,
        media_id: &str,
        explicit_id: bool,
        datastore: &Datastore,
        buffered: &BufferedContent,
    ) -> MediaStoreResult<MediaRecord> {
        let ctx = &self.ctx;
        let mut builder = MediaRecord::builder();
        builder
            .origin(request.origin.as_str())
            .media_id(media_id)
            .size_bytes(buffered.size())
            .content_type(request.content_type.as_str())
            .upload_name(request.file_name.as_str())
            .user_id(request.user_id.as_str());

        let existing = find_record(
            ctx,
            buffered.hash(),
            &request.user_id,
            &request.content_type,
            &request.file_name,
        )
        .await?;
        match existing {
            Some(ExistingContent::Perfect(record)) if !explicit_id => {
                debug!(mxc = %record.mxc(), "Upload is a perfect duplicate");
                return Ok(record);
            }
            Some(existing) => {
                let record = builder
                    .locatable(existing.record().locatable().clone())
                    .quarantined(existing.record().quarantined())
                    .build()
                    .map_err(|e| MediaError::internal(e.to_string()))?;
                ctx.database().insert_media(&record).await?;
                debug!(mxc = %record.mxc(), shared_with = %existing.record().mxc(), "Reusing stored content");
                upload_done(ctx, &record).await;
                return Ok(record);
            }
            None => {}
        }

        let locatable = store_buffered(ctx, datastore, buffered, &request.content_type).await?;
        let record = builder
            .locatable(locatable.clone())
            .build()
            .map_err(|e| MediaError::internal(e.to_string()))?;
        if let Err(e) = ctx.database().insert_media(&record).await {
            if let Err(remove_err) = datastore.remove(locatable.location()).await {
                warn!(
                    locatable = %locatable,
                    error = %remove_err,
                    "Failed to remove upload after database error"
                );
            }
            return Err(e);
        }
        upload_done(ctx, &record).await;
        Ok(record)
    }
}
