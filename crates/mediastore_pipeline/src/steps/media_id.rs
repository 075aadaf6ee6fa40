//! Media ID issuance.

use crate::MediaContext;
use chrono::Utc;
use mediastore_core::{HeldMediaId, HeldReason};
use mediastore_error::{MediaError, MediaStoreResult};
use tracing::{debug, instrument};

const MAX_ATTEMPTS: usize = 10;

/// Issue a media ID unused under `origin`, holding it against concurrent
/// issuance.
///
/// # Errors
///
/// Fails with an internal error after ten colliding candidates.
#[instrument(skip(ctx))]
pub async fn generate_media_id(ctx: &MediaContext, origin: &str) -> MediaStoreResult<String> {
    let db = ctx.database();
    for attempt in 1..=MAX_ATTEMPTS {
        let media_id = ctx.candidate_media_id();
        let held = HeldMediaId {
            origin: origin.to_string(),
            media_id: media_id.clone(),
            reason: HeldReason::ForCreate,
            held_at: Utc::now(),
        };
        if !db.try_insert_held(&held).await? {
            debug!(attempt, media_id, "Media ID already held");
            continue;
        }
        if db.media_id_exists(origin, &media_id).await? {
            debug!(attempt, media_id, "Media ID already in use");
            continue;
        }
        if db.reserved_id_exists(origin, &media_id).await? {
            debug!(attempt, media_id, "Media ID is reserved");
            continue;
        }
        return Ok(media_id);
    }
    Err(MediaError::internal(format!(
        "failed to generate a media ID for {} after {} attempts",
        origin, MAX_ATTEMPTS
    ))
    .into())
}
