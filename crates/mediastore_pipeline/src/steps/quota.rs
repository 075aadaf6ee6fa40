//! Per-user upload quotas.

use crate::MediaContext;
use chrono::Utc;
use mediastore_config::{UploadsConfig, glob_matches};
use mediastore_error::{MediaErrorKind, MediaStoreError, MediaStoreResult};
use tracing::{debug, warn};

/// The quantities a user can be limited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaType {
    /// Total uploaded bytes; a negative limit is unlimited
    MaxBytes,
    /// Live two-phase reservations; zero is unlimited
    MaxPending,
    /// Uploaded files; zero is unlimited
    MaxCount,
}

fn default_limit(uploads: &UploadsConfig, quota_type: QuotaType) -> i64 {
    match quota_type {
        QuotaType::MaxBytes => -1,
        QuotaType::MaxPending => uploads.max_pending,
        QuotaType::MaxCount => 0,
    }
}

/// Effective limit of `quota_type` for `user_id`.
///
/// A positive database override wins and a zero override means the built-in
/// default. Otherwise the first configured rule whose glob matches the user
/// applies, falling back to the built-in default.
pub async fn limit(ctx: &MediaContext, user_id: &str, quota_type: QuotaType) -> MediaStoreResult<i64> {
    let uploads = &ctx.config().uploads;
    if !uploads.quota.enabled {
        return Ok(default_limit(uploads, quota_type));
    }

    match ctx.database().get_user_quota(user_id).await {
        Ok(Some(quota)) => {
            let value = match quota_type {
                QuotaType::MaxBytes => quota.max_bytes,
                QuotaType::MaxPending => quota.max_pending,
                QuotaType::MaxCount => quota.max_files,
            };
            if value > 0 {
                return Ok(value);
            }
            if value == 0 {
                return Ok(default_limit(uploads, quota_type));
            }
        }
        Ok(None) => debug!(user_id, "No stored quota for user, using configured rules"),
        Err(e) => warn!(user_id, error = %e, "Failed to read stored quota, using configured rules"),
    }

    let rule = uploads
        .quota
        .user_quotas
        .iter()
        .find(|rule| glob_matches(&rule.glob, user_id));
    Ok(match (rule, quota_type) {
        (Some(rule), QuotaType::MaxBytes) => rule.max_bytes,
        (Some(rule), QuotaType::MaxPending) => rule.max_pending,
        (Some(rule), QuotaType::MaxCount) => rule.max_files,
        (None, _) => default_limit(uploads, quota_type),
    })
}

/// Current usage of `quota_type` by `user_id`.
pub async fn current(ctx: &MediaContext, user_id: &str, quota_type: QuotaType) -> MediaStoreResult<i64> {
    let db = ctx.database();
    match quota_type {
        QuotaType::MaxBytes => db.user_uploaded_bytes(user_id).await,
        QuotaType::MaxPending => db.count_pending_by_user(user_id, Utc::now()).await,
        QuotaType::MaxCount => db.count_media_by_user(user_id).await,
    }
}

/// Fail with `QuotaExceeded` if `user_id` has used up `quota_type`.
///
/// Limits of zero or below are unlimited here.
pub async fn check(ctx: &MediaContext, user_id: &str, quota_type: QuotaType) -> MediaStoreResult<()> {
    let limit = limit(ctx, user_id, quota_type).await?;
    if limit <= 0 {
        return Ok(());
    }
    let count = current(ctx, user_id, quota_type).await?;
    if count < limit {
        Ok(())
    } else {
        debug!(user_id, ?quota_type, count, limit, "Quota exceeded");
        Err(MediaStoreError::media(MediaErrorKind::QuotaExceeded))
    }
}

/// Fail with `QuotaExceeded` unless `user_id` may upload `bytes` more bytes
/// and one more file.
pub async fn can_upload(ctx: &MediaContext, user_id: &str, bytes: u64) -> MediaStoreResult<()> {
    let limit = limit(ctx, user_id, QuotaType::MaxBytes).await?;
    if limit >= 0 {
        let count = current(ctx, user_id, QuotaType::MaxBytes).await?;
        let incoming = i64::try_from(bytes).unwrap_or(i64::MAX);
        if count.saturating_add(incoming) > limit {
            debug!(user_id, count, bytes, limit, "Upload would exceed byte quota");
            return Err(MediaStoreError::media(MediaErrorKind::QuotaExceeded));
        }
    }
    check(ctx, user_id, QuotaType::MaxCount).await
}
