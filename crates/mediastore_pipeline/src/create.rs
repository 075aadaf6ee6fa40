//! Reserving media IDs for two-phase uploads.

use crate::MediaContext;
use crate::steps::media_id::generate_media_id;
use crate::steps::quota::{self, QuotaType};
use chrono::Utc;
use mediastore_core::ExpiringMediaRecord;
use mediastore_error::{MediaError, MediaStoreResult};
use std::time::Duration;
use tracing::{info, instrument};

/// Issues media IDs ahead of their bytes.
#[derive(Debug, Clone)]
pub struct CreatePipeline {
    ctx: MediaContext,
}

impl CreatePipeline {
    /// Create a reservation pipeline over `ctx`.
    pub fn new(ctx: MediaContext) -> Self {
        Self { ctx }
    }

    /// Reserve a new media ID under `origin` for `user_id`.
    ///
    /// The reservation lapses after `expires_in`, or the configured upload
    /// age when `None`.
    ///
    /// # Errors
    ///
    /// `QuotaExceeded` if the user already holds their limit of pending
    /// reservations.
    #[instrument(skip(self))]
    pub async fn execute(
        &self,
        origin: &str,
        user_id: &str,
        expires_in: Option<Duration>,
    ) -> MediaStoreResult<ExpiringMediaRecord> {
        quota::check(&self.ctx, user_id, QuotaType::MaxPending).await?;

        let media_id = generate_media_id(&self.ctx, origin).await?;

        let expires_in = expires_in
            .unwrap_or_else(|| Duration::from_secs(self.ctx.config().uploads.max_age_seconds));
        let expires_in = chrono::Duration::from_std(expires_in)
            .map_err(|e| MediaError::internal(format!("invalid reservation lifetime: {}", e)))?;
        let reservation = ExpiringMediaRecord {
            origin: origin.to_string(),
            media_id,
            user_id: user_id.to_string(),
            expires_at: Utc::now() + expires_in,
        };
        self.ctx.database().insert_expiring(&reservation).await?;
        info!(media_id = %reservation.media_id, expires_at = %reservation.expires_at, "Reserved media ID");
        Ok(reservation)
    }
}
