//! Upload lock keyed by content hash.
//!
//! Concurrent uploads of identical bytes are serialized so that the
//! "check for duplicates, else persist" step runs for one of them at a time.

use async_trait::async_trait;
use mediastore_config::LockConfig;
use mediastore_error::{MediaErrorKind, MediaStoreError, MediaStoreResult};
use mediastore_interface::{DistributedLock, LockToken};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, instrument, warn};

/// In-process [`DistributedLock`] for single-instance deployments and tests.
#[derive(Debug, Default)]
pub struct LocalLockBackend {
    held: Mutex<HashMap<String, (LockToken, Instant)>>,
}

impl LocalLockBackend {
    /// Create a lock table with nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `key` is held and has not lapsed.
    pub fn is_held(&self, key: &str) -> bool {
        let now = Instant::now();
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|(_, expires)| *expires > now)
    }
}

#[async_trait]
impl DistributedLock for LocalLockBackend {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> MediaStoreResult<Option<LockToken>> {
        let now = Instant::now();
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if held.get(key).is_some_and(|(_, expires)| *expires > now) {
            return Ok(None);
        }
        let token = LockToken(uuid::Uuid::new_v4().simple().to_string());
        held.insert(key.to_string(), (token.clone(), now + ttl));
        Ok(Some(token))
    }

    async fn release(&self, key: &str, token: &LockToken) -> MediaStoreResult<()> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if held.get(key).is_some_and(|(owner, _)| owner == token) {
            held.remove(key);
        }
        Ok(())
    }
}

/// Acquires upload locks with backoff and a hard attempt deadline.
#[derive(Clone)]
pub struct UploadLocker {
    backend: Option<Arc<dyn DistributedLock>>,
    ttl: Duration,
    max_attempt: Duration,
}

impl std::fmt::Debug for UploadLocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadLocker")
            .field("enabled", &self.backend.is_some())
            .field("ttl", &self.ttl)
            .field("max_attempt", &self.max_attempt)
            .finish()
    }
}

impl UploadLocker {
    /// Lock through `backend`, or run unlocked when it is absent or locking
    /// is disabled in `config`.
    pub fn new(backend: Option<Arc<dyn DistributedLock>>, config: &LockConfig) -> Self {
        Self {
            backend: backend.filter(|_| config.enabled),
            ttl: Duration::from_secs(config.ttl_seconds),
            max_attempt: Duration::from_secs(config.max_attempt_seconds),
        }
    }

    /// A locker that never locks.
    pub fn unlocked() -> Self {
        Self {
            backend: None,
            ttl: Duration::ZERO,
            max_attempt: Duration::ZERO,
        }
    }

    /// Take the upload lock for `hash`.
    ///
    /// # Errors
    ///
    /// Returns [`MediaErrorKind::LockTimeout`] if the lock stays contended
    /// past the attempt deadline, or the backend's error if it fails.
    #[instrument(skip(self))]
    pub async fn lock(&self, hash: &str) -> MediaStoreResult<UploadLock> {
        let Some(backend) = &self.backend else {
            warn!(hash, "No upload lock configured, continuing without one");
            return Ok(UploadLock { held: None });
        };
        let key = format!("upload:{}", hash);

        let retry_strategy = ExponentialBackoff::from_millis(10)
            .factor(2)
            .max_delay(Duration::from_millis(500))
            .map(jitter);
        let attempts = Retry::spawn(retry_strategy, || {
            let backend = Arc::clone(backend);
            let key = key.clone();
            let ttl = self.ttl;
            async move {
                match backend.try_acquire(&key, ttl).await {
                    Ok(Some(token)) => Ok(token),
                    Ok(None) => Err(RetryError::Transient {
                        err: MediaStoreError::media(MediaErrorKind::LockTimeout(key)),
                        retry_after: None,
                    }),
                    Err(e) => Err(RetryError::Permanent(e)),
                }
            }
        });

        match tokio::time::timeout(self.max_attempt, attempts).await {
            Ok(Ok(token)) => {
                debug!(hash, "Acquired upload lock");
                Ok(UploadLock {
                    held: Some(HeldLock {
                        backend: Arc::clone(backend),
                        key,
                        token,
                    }),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(hash, timeout = ?self.max_attempt, "Timed out acquiring upload lock");
                Err(MediaStoreError::media(MediaErrorKind::LockTimeout(
                    hash.to_string(),
                )))
            }
        }
    }
}

struct HeldLock {
    backend: Arc<dyn DistributedLock>,
    key: String,
    token: LockToken,
}

impl HeldLock {
    async fn release(self) {
        if let Err(e) = self.backend.release(&self.key, &self.token).await {
            warn!(key = %self.key, error = %e, "Failed to release upload lock");
        }
    }
}

/// A held upload lock.
///
/// Released by [`UploadLock::release`], or in the background when dropped.
#[must_use = "the lock is released as soon as it is dropped"]
pub struct UploadLock {
    held: Option<HeldLock>,
}

impl std::fmt::Debug for UploadLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadLock")
            .field("key", &self.held.as_ref().map(|h| h.key.as_str()))
            .finish()
    }
}

impl UploadLock {
    /// False when running without a lock backend.
    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Release the lock now.
    pub async fn release(mut self) {
        if let Some(held) = self.held.take() {
            held.release().await;
        }
    }
}

impl Drop for UploadLock {
    fn drop(&mut self) {
        let Some(held) = self.held.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(held.release());
            }
            Err(_) => warn!(key = %held.key, "No runtime to release upload lock, leaving it to expire"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediastore_error::ErrorCategory;

    fn config(max_attempt_seconds: u64) -> LockConfig {
        LockConfig {
            enabled: true,
            ttl_seconds: 60,
            max_attempt_seconds,
        }
    }

    fn locker(backend: &Arc<LocalLockBackend>, max_attempt_seconds: u64) -> UploadLocker {
        let backend: Arc<dyn DistributedLock> = backend.clone();
        UploadLocker::new(Some(backend), &config(max_attempt_seconds))
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_released() {
        let backend = Arc::new(LocalLockBackend::new());
        let locker = locker(&backend, 1);

        let lock = locker.lock("abc").await.unwrap();
        assert!(lock.is_held());
        assert!(backend.is_held("upload:abc"));

        lock.release().await;
        assert!(!backend.is_held("upload:abc"));
    }

    #[tokio::test]
    async fn contended_lock_times_out() {
        let backend = Arc::new(LocalLockBackend::new());
        let locker = locker(&backend, 1);

        let _first = locker.lock("abc").await.unwrap();
        let err = locker.lock("abc").await.unwrap_err();
        assert!(err.is(ErrorCategory::LockTimeout));
    }

    #[tokio::test]
    async fn waiter_acquires_after_release() {
        let backend = Arc::new(LocalLockBackend::new());
        let locker = locker(&backend, 5);

        let first = locker.lock("abc").await.unwrap();
        let waiter = {
            let locker = locker.clone();
            tokio::spawn(async move { locker.lock("abc").await.map(|l| l.is_held()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        first.release().await;

        assert!(waiter.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn disabled_locking_returns_unheld_guard() {
        let backend: Arc<dyn DistributedLock> = Arc::new(LocalLockBackend::new());
        let mut cfg = config(1);
        cfg.enabled = false;
        let locker = UploadLocker::new(Some(backend), &cfg);

        let lock = locker.lock("abc").await.unwrap();
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn stale_token_cannot_release() {
        let backend = LocalLockBackend::new();
        let token = backend
            .try_acquire("k", Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();
        backend
            .release("k", &LockToken("someone-else".into()))
            .await
            .unwrap();
        assert!(backend.is_held("k"));
        backend.release("k", &token).await.unwrap();
        assert!(!backend.is_held("k"));
    }
}
