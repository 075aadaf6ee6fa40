//! In-memory implementation of MediaDatabase.
//!
//! All tables live in one `RwLock`-protected struct, so each trait call is
//! atomic with respect to the others. All data is lost when the database is
//! dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediastore_core::{
    ExpiringMediaRecord, HeldMediaId, MediaRecord, ThumbnailKey, ThumbnailRecord, UserQuota,
};
use mediastore_error::{DatabaseError, DatabaseErrorKind, MediaStoreResult};
use mediastore_interface::MediaDatabase;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

type MediaKey = (String, String);

#[derive(Debug, Default)]
struct Tables {
    media: HashMap<MediaKey, MediaRecord>,
    quarantined_hashes: HashSet<String>,
    thumbnails: HashMap<ThumbnailKey, ThumbnailRecord>,
    expiring: HashMap<MediaKey, ExpiringMediaRecord>,
    held: HashMap<MediaKey, HeldMediaId>,
    reserved: HashSet<MediaKey>,
    user_quotas: HashMap<String, UserQuota>,
    last_access: HashMap<String, DateTime<Utc>>,
}

fn key(origin: &str, media_id: &str) -> MediaKey {
    (origin.to_string(), media_id.to_string())
}

/// In-memory metadata database.
///
/// # Example
/// ```
/// use mediastore_database::InMemoryMediaDatabase;
/// use mediastore_interface::MediaDatabase;
///
/// #[tokio::main]
/// async fn main() {
///     let db = InMemoryMediaDatabase::new();
///     assert!(!db.media_id_exists("example.org", "abc").await.unwrap());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryMediaDatabase {
    tables: Arc<RwLock<Tables>>,
    fail_media_inserts: Arc<AtomicBool>,
}

impl InMemoryMediaDatabase {
    /// Create a new empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with a quota override.
    pub async fn set_user_quota(&self, user_id: &str, quota: UserQuota) {
        self.tables
            .write()
            .await
            .user_quotas
            .insert(user_id.to_string(), quota);
    }

    /// Permanently reserve an ID so it is never issued.
    pub async fn add_reserved_id(&self, origin: &str, media_id: &str) {
        self.tables.write().await.reserved.insert(key(origin, media_id));
    }

    /// Last recorded access for content `hash`.
    pub async fn last_access(&self, hash: &str) -> Option<DateTime<Utc>> {
        self.tables.read().await.last_access.get(hash).copied()
    }

    /// Number of held IDs.
    pub async fn held_count(&self) -> usize {
        self.tables.read().await.held.len()
    }

    /// Number of media records.
    pub async fn media_count(&self) -> usize {
        self.tables.read().await.media.len()
    }

    /// Make subsequent media inserts fail, simulating an unavailable database.
    pub fn fail_media_inserts(&self, fail: bool) {
        self.fail_media_inserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaDatabase for InMemoryMediaDatabase {
    async fn get_media(&self, origin: &str, media_id: &str) -> MediaStoreResult<Option<MediaRecord>> {
        Ok(self.tables.read().await.media.get(&key(origin, media_id)).cloned())
    }

    async fn media_id_exists(&self, origin: &str, media_id: &str) -> MediaStoreResult<bool> {
        Ok(self.tables.read().await.media.contains_key(&key(origin, media_id)))
    }

    #[tracing::instrument(skip(self, record), fields(mxc = %record.mxc()))]
    async fn insert_media(&self, record: &MediaRecord) -> MediaStoreResult<()> {
        if self.fail_media_inserts.load(Ordering::SeqCst) {
            return Err(DatabaseError::new(DatabaseErrorKind::Connection(
                "database unavailable".to_string(),
            ))
            .into());
        }
        let mut tables = self.tables.write().await;
        let k = key(record.origin(), record.media_id());
        if tables.media.contains_key(&k) {
            return Err(DatabaseError::new(DatabaseErrorKind::Duplicate(record.mxc())).into());
        }
        let quarantined = record.quarantined() || tables.quarantined_hashes.contains(record.content_hash());
        tables
            .media
            .insert(k, record.clone().with_quarantined(quarantined));
        Ok(())
    }

    async fn media_by_hash(&self, hash: &str) -> MediaStoreResult<Vec<MediaRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<MediaRecord> = tables
            .media
            .values()
            .filter(|r| r.content_hash() == hash)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at().cmp(b.created_at()));
        Ok(records)
    }

    #[tracing::instrument(skip(self))]
    async fn set_quarantined_by_hash(&self, hash: &str, quarantined: bool) -> MediaStoreResult<u64> {
        let mut tables = self.tables.write().await;
        if quarantined {
            tables.quarantined_hashes.insert(hash.to_string());
        } else {
            tables.quarantined_hashes.remove(hash);
        }
        let mut updated = 0;
        for record in tables.media.values_mut() {
            if record.content_hash() == hash {
                *record = record.clone().with_quarantined(quarantined);
                updated += 1;
            }
        }
        tracing::info!(updated, "Updated quarantine flag by hash");
        Ok(updated)
    }

    async fn is_hash_quarantined(&self, hash: &str) -> MediaStoreResult<bool> {
        Ok(self.tables.read().await.quarantined_hashes.contains(hash))
    }

    async fn count_media_by_user(&self, user_id: &str) -> MediaStoreResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .media
            .values()
            .filter(|r| r.user_id() == user_id)
            .count() as i64)
    }

    async fn user_uploaded_bytes(&self, user_id: &str) -> MediaStoreResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .media
            .values()
            .filter(|r| r.user_id() == user_id)
            .map(|r| *r.size_bytes() as i64)
            .sum())
    }

    async fn get_thumbnail(&self, key: &ThumbnailKey) -> MediaStoreResult<Option<ThumbnailRecord>> {
        Ok(self.tables.read().await.thumbnails.get(key).cloned())
    }

    async fn insert_thumbnail(&self, record: &ThumbnailRecord) -> MediaStoreResult<()> {
        let mut tables = self.tables.write().await;
        let k = record.key();
        if tables.thumbnails.contains_key(&k) {
            return Err(DatabaseError::new(DatabaseErrorKind::Duplicate(format!(
                "thumbnail {}/{} {}x{} {} animated={}",
                k.origin, k.media_id, k.width, k.height, k.method, k.animated
            )))
            .into());
        }
        tables.thumbnails.insert(k, record.clone());
        Ok(())
    }

    async fn insert_expiring(&self, record: &ExpiringMediaRecord) -> MediaStoreResult<()> {
        let mut tables = self.tables.write().await;
        let k = key(&record.origin, &record.media_id);
        if tables.expiring.contains_key(&k) {
            return Err(DatabaseError::new(DatabaseErrorKind::Duplicate(format!(
                "reservation {}/{}",
                record.origin, record.media_id
            )))
            .into());
        }
        tables.expiring.insert(k, record.clone());
        Ok(())
    }

    async fn get_expiring(
        &self,
        origin: &str,
        media_id: &str,
    ) -> MediaStoreResult<Option<ExpiringMediaRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .expiring
            .get(&key(origin, media_id))
            .cloned())
    }

    async fn delete_expiring(&self, origin: &str, media_id: &str) -> MediaStoreResult<()> {
        self.tables.write().await.expiring.remove(&key(origin, media_id));
        Ok(())
    }

    async fn count_pending_by_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> MediaStoreResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .expiring
            .values()
            .filter(|r| r.user_id == user_id && !r.is_expired_at(now))
            .count() as i64)
    }

    async fn try_insert_held(&self, held: &HeldMediaId) -> MediaStoreResult<bool> {
        let mut tables = self.tables.write().await;
        let k = key(&held.origin, &held.media_id);
        if tables.held.contains_key(&k) {
            return Ok(false);
        }
        tables.held.insert(k, held.clone());
        Ok(true)
    }

    async fn delete_held_older_than(&self, cutoff: DateTime<Utc>) -> MediaStoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.held.len();
        tables.held.retain(|_, held| held.held_at >= cutoff);
        Ok((before - tables.held.len()) as u64)
    }

    async fn reserved_id_exists(&self, origin: &str, media_id: &str) -> MediaStoreResult<bool> {
        Ok(self.tables.read().await.reserved.contains(&key(origin, media_id)))
    }

    async fn get_user_quota(&self, user_id: &str) -> MediaStoreResult<Option<UserQuota>> {
        Ok(self.tables.read().await.user_quotas.get(user_id).copied())
    }

    async fn record_access(&self, hash: &str, at: DateTime<Utc>) -> MediaStoreResult<()> {
        self.tables
            .write()
            .await
            .last_access
            .insert(hash.to_string(), at);
        Ok(())
    }
}
