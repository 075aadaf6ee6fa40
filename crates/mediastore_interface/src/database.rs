//! Metadata database interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediastore_core::{
    ExpiringMediaRecord, HeldMediaId, MediaRecord, ThumbnailKey, ThumbnailRecord, UserQuota,
};
use mediastore_error::MediaStoreResult;

/// Persistence for media, thumbnail, reservation and quota records.
///
/// Implementations must be safe to share across tasks. Inserts fail with
/// `DatabaseErrorKind::Duplicate` when the identity already exists.
#[async_trait]
pub trait MediaDatabase: Send + Sync {
    // Media records

    /// Look up a media record.
    async fn get_media(&self, origin: &str, media_id: &str) -> MediaStoreResult<Option<MediaRecord>>;

    /// True if a media record exists for the ID.
    async fn media_id_exists(&self, origin: &str, media_id: &str) -> MediaStoreResult<bool>;

    /// Insert a new media record.
    async fn insert_media(&self, record: &MediaRecord) -> MediaStoreResult<()>;

    /// All media records whose content hash is `hash`.
    async fn media_by_hash(&self, hash: &str) -> MediaStoreResult<Vec<MediaRecord>>;

    /// Flag every record with content `hash`, and the hash itself, as
    /// quarantined. Returns the number of records updated.
    async fn set_quarantined_by_hash(&self, hash: &str, quarantined: bool) -> MediaStoreResult<u64>;

    /// True if content with `hash` has been quarantined.
    async fn is_hash_quarantined(&self, hash: &str) -> MediaStoreResult<bool>;

    /// Number of media records uploaded by `user_id`.
    async fn count_media_by_user(&self, user_id: &str) -> MediaStoreResult<i64>;

    /// Total bytes uploaded by `user_id`.
    async fn user_uploaded_bytes(&self, user_id: &str) -> MediaStoreResult<i64>;

    // Thumbnails

    /// Look up a thumbnail by identity.
    async fn get_thumbnail(&self, key: &ThumbnailKey) -> MediaStoreResult<Option<ThumbnailRecord>>;

    /// Insert a new thumbnail record.
    async fn insert_thumbnail(&self, record: &ThumbnailRecord) -> MediaStoreResult<()>;

    // Two-phase upload reservations

    /// Insert a reservation.
    async fn insert_expiring(&self, record: &ExpiringMediaRecord) -> MediaStoreResult<()>;

    /// Look up a reservation, expired or not.
    async fn get_expiring(
        &self,
        origin: &str,
        media_id: &str,
    ) -> MediaStoreResult<Option<ExpiringMediaRecord>>;

    /// Delete a reservation. Deleting a missing reservation is not an error.
    async fn delete_expiring(&self, origin: &str, media_id: &str) -> MediaStoreResult<()>;

    /// Number of unexpired reservations held by `user_id` at `now`.
    async fn count_pending_by_user(&self, user_id: &str, now: DateTime<Utc>)
    -> MediaStoreResult<i64>;

    // Held and reserved IDs

    /// Hold an ID. Returns false if it is already held.
    async fn try_insert_held(&self, held: &HeldMediaId) -> MediaStoreResult<bool>;

    /// Release holds taken before `cutoff`. Returns the number released.
    async fn delete_held_older_than(&self, cutoff: DateTime<Utc>) -> MediaStoreResult<u64>;

    /// True if the ID is permanently reserved and must never be issued.
    async fn reserved_id_exists(&self, origin: &str, media_id: &str) -> MediaStoreResult<bool>;

    // Users

    /// Per-user quota override, if the user is known.
    async fn get_user_quota(&self, user_id: &str) -> MediaStoreResult<Option<UserQuota>>;

    /// Note that content with `hash` was accessed at `at`.
    async fn record_access(&self, hash: &str, at: DateTime<Utc>) -> MediaStoreResult<()>;
}
