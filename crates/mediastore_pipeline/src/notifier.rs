//! Upload-done notifications for callers waiting on two-phase uploads.

use mediastore_core::MediaRecord;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

type Waiters = HashMap<String, HashMap<u64, oneshot::Sender<MediaRecord>>>;

fn mxc(origin: &str, media_id: &str) -> String {
    format!("mxc://{}/{}", origin, media_id)
}

/// Wakes callers blocked on a media ID when its upload completes.
#[derive(Debug, Default)]
pub struct UploadNotifier {
    waiters: Arc<Mutex<Waiters>>,
    next_id: AtomicU64,
}

impl UploadNotifier {
    /// Create a notifier with no waiters.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Waiters> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register interest in `origin/media_id`.
    ///
    /// Register before checking whether the record exists, otherwise an
    /// upload finishing in between is missed.
    pub fn subscribe(&self, origin: &str, media_id: &str) -> UploadWaiter {
        let key = mxc(origin, media_id);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.table().entry(key.clone()).or_default().insert(id, tx);
        UploadWaiter {
            key,
            id,
            rx,
            waiters: Arc::clone(&self.waiters),
        }
    }

    /// Hand `record` to everyone waiting on it. Returns how many were woken.
    pub fn upload_done(&self, record: &MediaRecord) -> usize {
        let Some(waiting) = self.table().remove(&record.mxc()) else {
            return 0;
        };
        let woken = waiting
            .into_values()
            .filter_map(|tx| tx.send(record.clone()).ok())
            .count();
        tracing::debug!(mxc = %record.mxc(), woken, "Notified upload waiters");
        woken
    }

    /// Waiters registered across all media IDs.
    pub fn waiter_count(&self) -> usize {
        self.table().values().map(HashMap::len).sum()
    }
}

/// Registration for one upload-done notification. Unregisters when dropped.
#[derive(Debug)]
pub struct UploadWaiter {
    key: String,
    id: u64,
    rx: oneshot::Receiver<MediaRecord>,
    waiters: Arc<Mutex<Waiters>>,
}

impl UploadWaiter {
    /// Wait for the upload to complete.
    ///
    /// Returns `None` if the notifier went away first.
    pub async fn wait(&mut self) -> Option<MediaRecord> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for UploadWaiter {
    fn drop(&mut self) {
        let mut table = self.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(waiting) = table.get_mut(&self.key) {
            waiting.remove(&self.id);
            if waiting.is_empty() {
                table.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediastore_core::Locatable;

    fn record(media_id: &str) -> MediaRecord {
        MediaRecord::builder()
            .origin("example.org")
            .media_id(media_id)
            .size_bytes(3u64)
            .content_type("text/plain")
            .locatable(Locatable::new("mem", "abcdef", "hash"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn upload_done_wakes_matching_waiters() {
        let notifier = UploadNotifier::new();
        let mut first = notifier.subscribe("example.org", "abc");
        let mut second = notifier.subscribe("example.org", "abc");
        let _other = notifier.subscribe("example.org", "xyz");

        assert_eq!(notifier.upload_done(&record("abc")), 2);
        assert_eq!(first.wait().await.unwrap().media_id(), "abc");
        assert_eq!(second.wait().await.unwrap().media_id(), "abc");
        assert_eq!(notifier.waiter_count(), 1);
    }

    #[test]
    fn dropped_waiter_unregisters() {
        let notifier = UploadNotifier::new();
        let waiter = notifier.subscribe("example.org", "abc");
        assert_eq!(notifier.waiter_count(), 1);
        drop(waiter);
        assert_eq!(notifier.waiter_count(), 0);
        assert_eq!(notifier.upload_done(&record("abc")), 0);
    }
}
