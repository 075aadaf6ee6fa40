//! Access tracking and upload-done notification.

use crate::MediaContext;
use chrono::Utc;
use mediastore_core::MediaRecord;

/// Note that content `hash` was just used. Failures are only logged.
pub(crate) async fn record_access(ctx: &MediaContext, hash: &str) {
    if let Err(e) = ctx.database().record_access(hash, Utc::now()).await {
        tracing::warn!(hash, error = %e, "Failed to record media access");
    }
}

/// Finish an upload: flag access and wake anyone waiting on the ID.
pub(crate) async fn upload_done(ctx: &MediaContext, record: &MediaRecord) {
    record_access(ctx, record.content_hash()).await;
    ctx.notifier().upload_done(record);
}
