//! Collaborators used when none is supplied.

use async_trait::async_trait;
use mediastore_cache::drain;
use mediastore_core::ByteStream;
use mediastore_error::{MediaErrorKind, MediaStoreError, MediaStoreResult};
use mediastore_interface::{
    FederationClient, GeneratedThumbnail, RemoteMedia, SpamChecker, SpamMetadata,
    ThumbnailGenerator, ThumbnailSpec,
};

/// Federation client for deployments that never fetch remote media.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFederation;

#[async_trait]
impl FederationClient for NoFederation {
    async fn fetch_remote_media(&self, origin: &str, media_id: &str) -> MediaStoreResult<RemoteMedia> {
        tracing::debug!(origin, media_id, "Remote fetching is not configured");
        Err(MediaStoreError::media(MediaErrorKind::NotFound))
    }
}

/// Spam checker that accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllSpamChecker;

#[async_trait]
impl SpamChecker for AllowAllSpamChecker {
    async fn check_for_spam(
        &self,
        stream: ByteStream,
        _metadata: &SpamMetadata,
    ) -> MediaStoreResult<bool> {
        drain(stream).await?;
        Ok(false)
    }
}

/// Thumbnail generator without decoders.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThumbnailer;

#[async_trait]
impl ThumbnailGenerator for NoThumbnailer {
    fn supports(&self, _content_type: &str) -> bool {
        false
    }

    async fn generate(
        &self,
        _source: ByteStream,
        content_type: &str,
        _spec: ThumbnailSpec,
    ) -> MediaStoreResult<GeneratedThumbnail> {
        Err(MediaStoreError::media(MediaErrorKind::Unsupported(
            content_type.to_string(),
        )))
    }
}
