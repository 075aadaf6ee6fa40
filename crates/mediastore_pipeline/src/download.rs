//! Download pipeline.

use crate::steps::access::record_access;
use crate::steps::collaborator_error;
use crate::steps::open::open_locatable;
use crate::steps::scope::{request_scope, within};
use crate::{CoalescingGroup, MediaContext, UploadPipeline, UploadRequest, UploadWaiter};
use chrono::Utc;
use mediastore_core::{ByteRange, MediaKind, MediaRecord, MediaStream, limit_stream};
use mediastore_error::{MediaErrorKind, MediaStoreError, MediaStoreResult};
use mediastore_storage::BufferedContent;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const DEFAULT_REMOTE_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_REMOTE_FILE_NAME: &str = "download";

/// How a download is performed.
///
/// # Examples
///
/// ```
/// use mediastore_core::ByteRange;
/// use mediastore_pipeline::DownloadOptions;
/// use std::time::Duration;
///
/// let opts = DownloadOptions {
///     fetch_remote_if_needed: true,
///     range: Some(ByteRange::new(0, Some(1024))),
///     block_for_read_until: Duration::from_secs(20),
///     ..Default::default()
/// };
/// assert!(!opts.record_only);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Fetch from the origin server when the media is not stored locally
    pub fetch_remote_if_needed: bool,
    /// Bytes to return; everything when `None`
    pub range: Option<ByteRange>,
    /// How long to wait for a pending two-phase upload to finish
    pub block_for_read_until: Duration,
    /// Return only the record, without opening a stream
    pub record_only: bool,
}

impl DownloadOptions {
    /// Signature of the options that change how media is resolved.
    ///
    /// The range and record-only flag only affect what each caller does with
    /// the resolved media, so they are left out.
    fn coalescing_signature(&self) -> String {
        format!(
            "remote={}&block={}",
            self.fetch_remote_if_needed,
            self.block_for_read_until.as_millis()
        )
    }
}

/// Where a resolved download's bytes come from.
#[derive(Debug, Clone)]
enum Body {
    /// Stored object, opened from cache or datastore
    Stored,
    /// Freshly fetched remote bytes, replayed from the upload buffer
    Fetched(BufferedContent),
}

#[derive(Debug, Clone)]
struct Resolution {
    record: MediaRecord,
    body: Body,
}

/// Result of a download.
#[derive(Debug)]
pub struct DownloadOutcome {
    /// The media record
    pub record: MediaRecord,
    /// Requested bytes, absent for record-only downloads
    pub stream: Option<MediaStream>,
    scope: CancellationToken,
}

impl DownloadOutcome {
    /// The request's bounding scope.
    ///
    /// Cancelled when the stream is closed or dropped, when the request
    /// deadline (`downloads.request_timeout_seconds`) passes, or right away
    /// for record-only downloads. A stream whose scope is cancelled by the
    /// deadline fails with `TimedOut` on its next read.
    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }
}

/// Serves stored media, fetching remote media on a miss.
///
/// Concurrent downloads of the same media with equivalent options share one
/// lookup and at most one remote fetch.
#[derive(Debug, Clone)]
pub struct DownloadPipeline {
    ctx: MediaContext,
    uploads: UploadPipeline,
    group: CoalescingGroup<Resolution>,
}

impl DownloadPipeline {
    /// Create a download pipeline over `ctx`.
    pub fn new(ctx: MediaContext) -> Self {
        Self {
            uploads: UploadPipeline::new(ctx.clone()),
            ctx,
            group: CoalescingGroup::new(),
        }
    }

    /// Callers waiting on an in-flight resolution.
    pub fn waiter_count(&self) -> usize {
        self.group.waiter_count()
    }

    /// Resolutions in progress.
    pub fn in_flight(&self) -> usize {
        self.group.in_flight()
    }

    /// Download `origin/media_id`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the media is unknown and cannot be fetched,
    /// `Quarantined` when it is blocked, `NotYetUploaded` when a pending
    /// upload does not finish within `block_for_read_until`, `TooLarge` for
    /// oversized remote media, or whatever stopped the remote fetch.
    #[instrument(skip(self, opts), fields(range = ?opts.range, record_only = opts.record_only))]
    pub async fn execute(
        &self,
        origin: &str,
        media_id: &str,
        opts: DownloadOptions,
    ) -> MediaStoreResult<DownloadOutcome> {
        if opts.range.is_some_and(|range| !range.is_valid()) {
            return Err(MediaStoreError::media(MediaErrorKind::BadRequest(
                "byte range ends before it starts".to_string(),
            )));
        }

        let scope = request_scope(self.ctx.request_timeout());
        let release = scope.clone().drop_guard();
        let key = format!("{}/{}?{}", origin, media_id, opts.coalescing_signature());
        let leader = self.clone();
        let (leader_origin, leader_media_id) = (origin.to_string(), media_id.to_string());
        let resolving = self.group.run(&key, move || async move {
            leader.resolve(&leader_origin, &leader_media_id, opts).await
        });
        let Resolution { record, body } = within(&scope, &format!("download of {}", key), resolving).await?;

        if record.quarantined() {
            debug!(mxc = %record.mxc(), "Refusing quarantined media");
            return Err(MediaStoreError::media(MediaErrorKind::Quarantined));
        }

        if opts.record_only {
            drop(release);
            return Ok(DownloadOutcome {
                record,
                stream: None,
                scope,
            });
        }

        record_access(&self.ctx, record.content_hash()).await;
        let stream = match &body {
            Body::Stored => open_locatable(&self.ctx, record.locatable(), opts.range).await?,
            Body::Fetched(buffered) => {
                buffered
                    .open_range(opts.range.unwrap_or(ByteRange::from_start(0)))
                    .await?
            }
        };
        Ok(DownloadOutcome {
            record,
            stream: Some(MediaStream::with_scope(stream, release.disarm())),
            scope,
        })
    }

    /// Find the record locally, wait for a pending upload, or fetch it.
    async fn resolve(
        &self,
        origin: &str,
        media_id: &str,
        opts: DownloadOptions,
    ) -> MediaStoreResult<Resolution> {
        let db = self.ctx.database();
        let mut waiter = self.ctx.notifier().subscribe(origin, media_id);

        if let Some(record) = db.get_media(origin, media_id).await? {
            return Ok(Resolution {
                record,
                body: Body::Stored,
            });
        }
        if let Some(record) = self
            .await_pending_upload(&mut waiter, origin, media_id, opts.block_for_read_until)
            .await?
        {
            return Ok(Resolution {
                record,
                body: Body::Stored,
            });
        }
        drop(waiter);

        if !opts.fetch_remote_if_needed {
            return Err(MediaStoreError::media(MediaErrorKind::NotFound));
        }
        if self.ctx.config().is_local_origin(origin) {
            debug!(origin, "Not fetching media for a local origin");
            return Err(MediaStoreError::media(MediaErrorKind::NotFound));
        }
        self.fetch_remote(origin, media_id).await
    }

    /// Block on a live two-phase reservation until its upload completes.
    async fn await_pending_upload(
        &self,
        waiter: &mut UploadWaiter,
        origin: &str,
        media_id: &str,
        block_for: Duration,
    ) -> MediaStoreResult<Option<MediaRecord>> {
        let db = self.ctx.database();
        let reservation = db.get_expiring(origin, media_id).await?;
        let Some(reservation) = reservation.filter(|r| !r.is_expired_at(Utc::now())) else {
            // The upload may have completed since the first lookup.
            return db.get_media(origin, media_id).await;
        };

        debug!(origin, media_id, ?block_for, "Waiting for pending upload");
        match tokio::time::timeout(block_for, waiter.wait()).await {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) | Err(_) => {
                debug!(origin, media_id, expires_at = %reservation.expires_at, "Pending upload did not finish in time");
                Err(MediaStoreError::media(MediaErrorKind::NotYetUploaded))
            }
        }
    }

    /// Fetch remote media on the download pool, remembering failures.
    async fn fetch_remote(&self, origin: &str, media_id: &str) -> MediaStoreResult<Resolution> {
        if let Some(err) = self.ctx.failures().get(origin, media_id) {
            debug!(origin, media_id, "Remote fetch failed recently, not retrying yet");
            return Err(err);
        }

        let this = self.clone();
        let (fetch_origin, fetch_media_id) = (origin.to_string(), media_id.to_string());
        let fetched = self
            .ctx
            .download_pool()
            .schedule(async move { this.fetch_and_store(&fetch_origin, &fetch_media_id).await })
            .await;
        if let Err(e) = &fetched {
            warn!(origin, media_id, error = %e, "Remote fetch failed");
            self.ctx.failures().insert(origin, media_id, e.clone());
        }
        fetched
    }

    async fn fetch_and_store(&self, origin: &str, media_id: &str) -> MediaStoreResult<Resolution> {
        let max_size = self.ctx.config().downloads.max_size_bytes;
        let remote = self
            .ctx
            .federation()
            .fetch_remote_media(origin, media_id)
            .await
            .map_err(|e| collaborator_error("federation client", e))?;
        if let Some(size) = remote.size_hint.filter(|size| *size > max_size) {
            debug!(origin, media_id, size, max_size, "Remote media advertises too many bytes");
            return Err(MediaStoreError::media(MediaErrorKind::TooLarge));
        }

        let request = UploadRequest {
            origin: origin.to_string(),
            media_id: Some(media_id.to_string()),
            content_type: remote
                .content_type
                .unwrap_or_else(|| DEFAULT_REMOTE_CONTENT_TYPE.to_string()),
            file_name: remote
                .file_name
                .unwrap_or_else(|| DEFAULT_REMOTE_FILE_NAME.to_string()),
            user_id: String::new(),
            kind: MediaKind::RemoteMedia,
        };
        let (record, buffered) = self
            .uploads
            .execute_buffered(request, limit_stream(remote.stream, max_size))
            .await?;
        info!(mxc = %record.mxc(), size = record.size_bytes(), "Stored remote media");
        Ok(Resolution {
            record,
            body: Body::Fetched(buffered),
        })
    }
}
