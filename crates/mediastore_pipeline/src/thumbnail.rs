//! Thumbnail pipeline.

use crate::steps::access::record_access;
use crate::steps::collaborator_error;
use crate::steps::open::open_locatable;
use crate::steps::persist::store_buffered;
use crate::steps::scope::{request_scope, within};
use crate::{CoalescingGroup, DownloadOptions, DownloadPipeline, MediaContext};
use bytes::Bytes;
use mediastore_config::ThumbnailsConfig;
use mediastore_core::{
    ByteStream, MediaKind, MediaRecord, MediaStream, ThumbnailKey, ThumbnailMethod,
    ThumbnailRecord, bytes_stream, collect_bytes,
};
use mediastore_error::{
    ErrorCategory, MediaError, MediaErrorKind, MediaStoreError, MediaStoreResult,
};
use mediastore_interface::ThumbnailSpec;
use mediastore_storage::BufferedContent;
use tracing::{debug, info, instrument, warn};

const PLACEHOLDER_CONTENT_TYPE: &str = "image/png";

/// A 1x1 transparent PNG.
const BUILTIN_PLACEHOLDER: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Normalize requested thumbnail dimensions against the configured sizes.
///
/// An exact match wins. Otherwise the smallest configured size covering the
/// request is used, or the largest configured dimensions when nothing
/// covers it. With dynamic sizing the request is only clamped to the largest
/// configured dimensions. Cropped thumbnails are then shrunk to the requested
/// aspect ratio.
///
/// # Errors
///
/// `BadRequest` for a zero width or height.
///
/// # Examples
///
/// ```
/// use mediastore_config::{ThumbnailSize, ThumbnailsConfig};
/// use mediastore_core::ThumbnailMethod;
/// use mediastore_pipeline::pick_new_dimensions;
///
/// let config = ThumbnailsConfig {
///     sizes: vec![ThumbnailSize::new(32, 32), ThumbnailSize::new(96, 96)],
///     ..Default::default()
/// };
/// let picked = pick_new_dimensions(&config, 50, 50, ThumbnailMethod::Scale).unwrap();
/// assert_eq!(picked, (96, 96));
/// ```
pub fn pick_new_dimensions(
    config: &ThumbnailsConfig,
    width: u32,
    height: u32,
    method: ThumbnailMethod,
) -> MediaStoreResult<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(MediaStoreError::media(MediaErrorKind::BadRequest(
            "thumbnail width and height must be positive".to_string(),
        )));
    }

    let mut target: Option<(u32, u32)> = None;
    let (mut largest_width, mut largest_height) = (0, 0);
    for size in &config.sizes {
        largest_width = largest_width.max(size.width);
        largest_height = largest_height.max(size.height);

        if size.width == width && size.height == height {
            return Ok((width, height));
        }
        if width <= size.width && height <= size.height {
            let smaller = target.is_none_or(|(w, h)| w > size.width && h > size.height);
            if smaller {
                target = Some((size.width, size.height));
            }
        }
    }

    if config.dynamic_sizing {
        return Ok((largest_width.min(width), largest_height.min(height)));
    }

    let (target_width, target_height) = target.unwrap_or((largest_width, largest_height));
    if method == ThumbnailMethod::Crop
        && u64::from(target_width) * u64::from(height) != u64::from(target_height) * u64::from(width)
    {
        let ratio = (target_width as f32 / width as f32).min(target_height as f32 / height as f32);
        let scaled = |side: u32| ((side as f32 * ratio) as u32).max(1);
        return Ok((scaled(width), scaled(height)));
    }
    Ok((target_width, target_height))
}

/// What thumbnail to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailOptions {
    /// Requested width
    pub width: u32,
    /// Requested height
    pub height: u32,
    /// Resize method
    pub method: ThumbnailMethod,
    /// Whether an animated thumbnail is wanted
    pub animated: bool,
    /// How the source media is resolved; `record_only` also skips the
    /// thumbnail stream
    pub download: DownloadOptions,
}

impl ThumbnailOptions {
    /// Options for a static thumbnail with default download behavior.
    pub fn new(width: u32, height: u32, method: ThumbnailMethod) -> Self {
        Self {
            width,
            height,
            method,
            animated: false,
            download: DownloadOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
enum Resolution {
    /// Previously generated
    Existing(ThumbnailRecord),
    /// Generated by this request; bytes replay from the buffer
    Generated(ThumbnailRecord, BufferedContent),
    /// Source is quarantined; placeholder bytes
    Quarantined(Bytes),
    /// Source is smaller than the thumbnail
    Original(MediaRecord),
}

/// Result of a thumbnail request.
///
/// Streams are absent when the request was record-only.
#[derive(Debug)]
pub enum ThumbnailOutcome {
    /// The requested thumbnail
    Thumbnail {
        /// Thumbnail record
        record: ThumbnailRecord,
        /// Thumbnail bytes
        stream: Option<MediaStream>,
    },
    /// The source media is quarantined; a placeholder image is served instead.
    ///
    /// This is the `Quarantined` failure carried alongside a body; callers
    /// that only report errors should map it via [`ThumbnailOutcome::category`].
    Quarantined {
        /// MIME type of the placeholder
        content_type: String,
        /// Placeholder bytes
        stream: Option<MediaStream>,
    },
    /// The source media is smaller than the requested thumbnail and is
    /// served as-is
    Original {
        /// Source media record
        record: MediaRecord,
        /// Source bytes
        stream: Option<MediaStream>,
    },
}

impl ThumbnailOutcome {
    /// Whether the placeholder for quarantined media was served.
    pub fn is_quarantined(&self) -> bool {
        matches!(self, Self::Quarantined { .. })
    }

    /// The error category a boundary should report, if any.
    ///
    /// `Some(ErrorCategory::Quarantined)` for the placeholder, `None` for
    /// outcomes that are plain successes.
    pub fn category(&self) -> Option<ErrorCategory> {
        self.is_quarantined().then_some(ErrorCategory::Quarantined)
    }

    /// The stream, whichever variant this is.
    pub fn into_stream(self) -> Option<MediaStream> {
        match self {
            Self::Thumbnail { stream, .. }
            | Self::Quarantined { stream, .. }
            | Self::Original { stream, .. } => stream,
        }
    }
}

/// Serves thumbnails, generating and persisting them on first request.
#[derive(Debug, Clone)]
pub struct ThumbnailPipeline {
    ctx: MediaContext,
    downloads: DownloadPipeline,
    group: CoalescingGroup<Resolution>,
}

impl ThumbnailPipeline {
    /// Create a thumbnail pipeline over `ctx`.
    pub fn new(ctx: MediaContext) -> Self {
        Self::with_downloads(ctx.clone(), DownloadPipeline::new(ctx))
    }

    /// Create a thumbnail pipeline resolving sources through `downloads`, so
    /// source lookups coalesce with ordinary downloads.
    pub fn with_downloads(ctx: MediaContext, downloads: DownloadPipeline) -> Self {
        Self {
            ctx,
            downloads,
            group: CoalescingGroup::new(),
        }
    }

    /// Callers waiting on an in-flight thumbnail.
    pub fn waiter_count(&self) -> usize {
        self.group.waiter_count()
    }

    /// Thumbnail of `origin/media_id` as described by `opts`.
    ///
    /// # Errors
    ///
    /// `BadRequest` for zero dimensions, `Unsupported` when the source cannot
    /// be thumbnailed, or any download error for the source other than
    /// `Quarantined`, which yields [`ThumbnailOutcome::Quarantined`].
    #[instrument(skip(self, opts), fields(width = opts.width, height = opts.height, method = %opts.method))]
    pub async fn execute(
        &self,
        origin: &str,
        media_id: &str,
        opts: ThumbnailOptions,
    ) -> MediaStoreResult<ThumbnailOutcome> {
        let (width, height) =
            pick_new_dimensions(&self.ctx.config().thumbnails, opts.width, opts.height, opts.method)?;
        let opts = ThumbnailOptions {
            width,
            height,
            ..opts
        };

        let scope = request_scope(self.ctx.request_timeout());
        let release = scope.clone().drop_guard();
        let key = format!(
            "{}/{}?w={}&h={}&m={}&a={}&remote={}&block={}",
            origin,
            media_id,
            opts.width,
            opts.height,
            opts.method,
            opts.animated,
            opts.download.fetch_remote_if_needed,
            opts.download.block_for_read_until.as_millis()
        );
        let leader = self.clone();
        let (leader_origin, leader_media_id) = (origin.to_string(), media_id.to_string());
        let resolving = self.group.run(&key, move || async move {
            leader.resolve(&leader_origin, &leader_media_id, opts).await
        });
        let resolution = within(&scope, &format!("thumbnail {}", key), resolving).await?;

        if opts.download.record_only {
            drop(release);
            return Ok(match resolution {
                Resolution::Existing(record) | Resolution::Generated(record, _) => {
                    ThumbnailOutcome::Thumbnail { record, stream: None }
                }
                Resolution::Quarantined(_) => ThumbnailOutcome::Quarantined {
                    content_type: PLACEHOLDER_CONTENT_TYPE.to_string(),
                    stream: None,
                },
                Resolution::Original(record) => ThumbnailOutcome::Original { record, stream: None },
            });
        }

        let scoped = move |stream: ByteStream| Some(MediaStream::with_scope(stream, release.disarm()));
        let outcome = match resolution {
            Resolution::Quarantined(bytes) => ThumbnailOutcome::Quarantined {
                content_type: PLACEHOLDER_CONTENT_TYPE.to_string(),
                stream: scoped(bytes_stream(bytes)),
            },
            Resolution::Existing(record) => {
                record_access(&self.ctx, record.content_hash()).await;
                let stream = open_locatable(&self.ctx, record.locatable(), None).await?;
                ThumbnailOutcome::Thumbnail {
                    record,
                    stream: scoped(stream),
                }
            }
            Resolution::Generated(record, buffered) => ThumbnailOutcome::Thumbnail {
                stream: scoped(buffered.open().await?),
                record,
            },
            Resolution::Original(record) => {
                record_access(&self.ctx, record.content_hash()).await;
                let stream = open_locatable(&self.ctx, record.locatable(), None).await?;
                ThumbnailOutcome::Original {
                    record,
                    stream: scoped(stream),
                }
            }
        };
        Ok(outcome)
    }

    async fn resolve(
        &self,
        origin: &str,
        media_id: &str,
        opts: ThumbnailOptions,
    ) -> MediaStoreResult<Resolution> {
        let source_opts = DownloadOptions {
            range: None,
            record_only: true,
            ..opts.download
        };
        let source = match self.downloads.execute(origin, media_id, source_opts).await {
            Ok(outcome) => outcome.record,
            Err(e) if e.is(ErrorCategory::Quarantined) => {
                debug!(origin, media_id, "Source media is quarantined, serving placeholder");
                return Ok(Resolution::Quarantined(self.placeholder(opts.width, opts.height).await));
            }
            Err(e) => return Err(e),
        };

        let key = ThumbnailKey {
            origin: origin.to_string(),
            media_id: media_id.to_string(),
            width: opts.width,
            height: opts.height,
            method: opts.method,
            animated: opts.animated,
        };
        if let Some(existing) = self.ctx.database().get_thumbnail(&key).await? {
            return Ok(Resolution::Existing(existing));
        }

        let thumbnails = &self.ctx.config().thumbnails;
        if source.size_bytes() > &thumbnails.max_source_bytes {
            debug!(size = source.size_bytes(), max = thumbnails.max_source_bytes, "Source too large to thumbnail");
            return Err(MediaStoreError::media(MediaErrorKind::Unsupported(
                source.content_type().clone(),
            )));
        }
        if !self.ctx.thumbnailer().supports(source.content_type()) {
            return Err(MediaStoreError::media(MediaErrorKind::Unsupported(
                source.content_type().clone(),
            )));
        }

        let this = self.clone();
        self.ctx
            .thumbnail_pool()
            .schedule(async move { this.generate_and_store(source, key).await })
            .await
    }

    async fn generate_and_store(&self, source: MediaRecord, key: ThumbnailKey) -> MediaStoreResult<Resolution> {
        let ctx = &self.ctx;
        let source_stream = open_locatable(ctx, source.locatable(), None).await?;
        let spec = ThumbnailSpec {
            width: key.width,
            height: key.height,
            method: key.method,
            animated: key.animated,
        };
        let generated = match ctx
            .thumbnailer()
            .generate(source_stream, source.content_type(), spec)
            .await
        {
            Ok(generated) => generated,
            Err(e) if e.is(ErrorCategory::DimensionsTooSmall) => {
                debug!(mxc = %source.mxc(), "Source smaller than thumbnail, serving original");
                return Ok(Resolution::Original(source));
            }
            Err(e) => return Err(collaborator_error("thumbnail generator", e)),
        };

        if generated.animated != key.animated {
            let actual_key = key.with_animated(generated.animated);
            if let Some(existing) = ctx.database().get_thumbnail(&actual_key).await? {
                debug!(mxc = %source.mxc(), "Thumbnail already exists for the generated animation flag");
                if !generated.animated {
                    // Static media never animates; answer future animated requests directly.
                    if let Err(e) = ctx.database().insert_thumbnail(&existing.alias_animated(true)).await {
                        warn!(error = %e, "Failed to record animated alias for static thumbnail");
                    }
                }
                return Ok(Resolution::Existing(existing));
            }
        }

        let datastore = ctx.datastores().pick(MediaKind::Thumbnails)?;
        let buffered = datastore.buffer_temp(generated.stream).await?;
        let locatable = store_buffered(ctx, &datastore, &buffered, &generated.content_type).await?;
        let mut builder = ThumbnailRecord::builder();
        builder
            .origin(key.origin.as_str())
            .media_id(key.media_id.as_str())
            .width(key.width)
            .height(key.height)
            .method(key.method)
            .animated(generated.animated)
            .content_type(generated.content_type.as_str())
            .size_bytes(buffered.size());
        let record = builder
            .locatable(locatable.clone())
            .build()
            .map_err(|e| MediaError::internal(e.to_string()))?;
        if let Err(e) = ctx.database().insert_thumbnail(&record).await {
            if let Err(remove_err) = datastore.remove(locatable.location()).await {
                warn!(
                    locatable = %locatable,
                    error = %remove_err,
                    "Failed to remove thumbnail after database error"
                );
            }
            return Err(e);
        }
        info!(mxc = %source.mxc(), width = key.width, height = key.height, "Generated thumbnail");
        Ok(Resolution::Generated(record, buffered))
    }

    /// Image served in place of a quarantined source's thumbnail.
    async fn placeholder(&self, width: u32, height: u32) -> Bytes {
        let configured = match &self.ctx.config().quarantine.thumbnail_path {
            Some(path) => match tokio::fs::read(path).await {
                Ok(bytes) => Some(Bytes::from(bytes)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read quarantine placeholder");
                    None
                }
            },
            None => None,
        };
        let image = configured.unwrap_or_else(|| Bytes::from_static(BUILTIN_PLACEHOLDER));

        let thumbnailer = self.ctx.thumbnailer();
        if !thumbnailer.supports(PLACEHOLDER_CONTENT_TYPE) {
            return image;
        }
        let spec = ThumbnailSpec {
            width,
            height,
            method: ThumbnailMethod::Scale,
            animated: false,
        };
        let resized = match thumbnailer
            .generate(bytes_stream(image.clone()), PLACEHOLDER_CONTENT_TYPE, spec)
            .await
        {
            Ok(generated) => collect_bytes(generated.stream).await.map_err(MediaStoreError::from),
            Err(e) => Err(e),
        };
        resized.unwrap_or_else(|e| {
            debug!(error = %e, "Serving placeholder at its original size");
            image
        })
    }
}
