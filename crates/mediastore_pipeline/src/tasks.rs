//! Periodic maintenance.

use crate::MediaContext;
use chrono::Utc;
use mediastore_error::{MediaError, MediaStoreResult};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Release media IDs held for longer than `held_ids.max_age_seconds`.
///
/// Returns how many holds were released.
#[instrument(skip(ctx))]
pub async fn sweep_held_media_ids(ctx: &MediaContext) -> MediaStoreResult<u64> {
    let max_age = chrono::Duration::from_std(Duration::from_secs(ctx.config().held_ids.max_age_seconds))
        .map_err(|e| MediaError::internal(format!("invalid held ID age: {}", e)))?;
    let released = ctx.database().delete_held_older_than(Utc::now() - max_age).await?;
    if released > 0 {
        info!(released, "Released stale held media IDs");
    }
    Ok(released)
}

/// Run maintenance every `held_ids.sweep_interval_seconds` until `shutdown`
/// is cancelled.
///
/// Each round sweeps held media IDs and purges expired remote-fetch
/// failures. Errors are logged and the loop carries on.
pub fn spawn_maintenance(ctx: MediaContext, shutdown: CancellationToken) -> JoinHandle<()> {
    let period = Duration::from_secs(ctx.config().held_ids.sweep_interval_seconds.max(1));
    debug!(?period, "Scheduling maintenance");
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Maintenance stopped");
                    break;
                }
                _ = interval_timer.tick() => {
                    if let Err(e) = sweep_held_media_ids(&ctx).await {
                        error!(error = ?e, "Held media ID sweep failed");
                    }
                    let purged = ctx.failures().purge_expired();
                    if purged > 0 {
                        debug!(purged, "Purged expired remote fetch failures");
                    }
                }
            }
        }
    })
}
