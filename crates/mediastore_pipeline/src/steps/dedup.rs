//! Deduplication lookup by content hash.

use crate::MediaContext;
use mediastore_core::MediaRecord;
use mediastore_error::MediaStoreResult;

/// Existing content matching an upload's hash.
#[derive(Debug, Clone)]
pub(crate) enum ExistingContent {
    /// Same bytes, uploader, content type and upload name
    Perfect(MediaRecord),
    /// Same bytes, different metadata
    HashOnly(MediaRecord),
}

impl ExistingContent {
    pub(crate) fn record(&self) -> &MediaRecord {
        match self {
            Self::Perfect(record) | Self::HashOnly(record) => record,
        }
    }
}

/// Find a stored record with content `hash`, preferring a perfect match.
pub(crate) async fn find_record(
    ctx: &MediaContext,
    hash: &str,
    user_id: &str,
    content_type: &str,
    file_name: &str,
) -> MediaStoreResult<Option<ExistingContent>> {
    let records = ctx.database().media_by_hash(hash).await?;
    let perfect = records.iter().find(|r| {
        r.user_id() == user_id && r.content_type() == content_type && r.upload_name() == file_name
    });
    if let Some(record) = perfect {
        return Ok(Some(ExistingContent::Perfect(record.clone())));
    }
    Ok(records.into_iter().next().map(ExistingContent::HashOnly))
}
