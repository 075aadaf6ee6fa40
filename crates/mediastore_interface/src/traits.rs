//! Collaborator traits.

use crate::{GeneratedThumbnail, LockToken, RemoteMedia, SpamMetadata, ThumbnailSpec};
use async_trait::async_trait;
use mediastore_core::ByteStream;
use mediastore_error::MediaStoreResult;
use std::time::Duration;

/// Client for fetching media from other servers.
#[async_trait]
pub trait FederationClient: Send + Sync {
    /// Fetch `mxc://origin/media_id` from its origin server.
    ///
    /// Returns [`MediaErrorKind::NotFound`](mediastore_error::MediaErrorKind::NotFound)
    /// when the origin does not have the media.
    async fn fetch_remote_media(&self, origin: &str, media_id: &str) -> MediaStoreResult<RemoteMedia>;
}

/// Content-based spam detection.
#[async_trait]
pub trait SpamChecker: Send + Sync {
    /// Returns true if the content is spam. Must consume `stream` fully.
    async fn check_for_spam(
        &self,
        stream: ByteStream,
        metadata: &SpamMetadata,
    ) -> MediaStoreResult<bool>;
}

/// Format-specific thumbnail rendering.
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    /// True if a decoder exists for `content_type`.
    fn supports(&self, content_type: &str) -> bool;

    /// Render a thumbnail of `source`.
    ///
    /// Fails with `Unsupported` when no decoder handles the content, or
    /// `DimensionsTooSmall` when the source is smaller than requested.
    async fn generate(
        &self,
        source: ByteStream,
        content_type: &str,
        spec: ThumbnailSpec,
    ) -> MediaStoreResult<GeneratedThumbnail>;
}

/// Cluster-wide mutual exclusion keyed by string.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try once to take `key`; `None` means someone else holds it.
    ///
    /// A held lock lapses after `ttl` even if never released.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> MediaStoreResult<Option<LockToken>>;

    /// Release `key` if `token` still holds it.
    async fn release(&self, key: &str, token: &LockToken) -> MediaStoreResult<()>;
}
