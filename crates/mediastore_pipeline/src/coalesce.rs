//! Per-process request coalescing.

use mediastore_error::{MediaError, MediaStoreResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type Outcome<T> = Option<MediaStoreResult<T>>;
type InFlight<T> = Arc<Mutex<HashMap<String, watch::Receiver<Outcome<T>>>>>;

/// Collapses concurrent calls that share a key into one execution.
///
/// The first caller for a key becomes the leader. Its work runs on a spawned
/// task, so it finishes even when every caller has gone away, and its outcome
/// is cloned to each caller that joined while it ran. Keys are forgotten as
/// soon as the work completes; outcomes are never cached.
///
/// # Examples
///
/// ```
/// use mediastore_pipeline::CoalescingGroup;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let group: CoalescingGroup<u32> = CoalescingGroup::new();
/// let value = group.run("answer", || async { Ok(42) }).await.unwrap();
/// assert_eq!(value, 42);
/// assert_eq!(group.in_flight(), 0);
/// # }
/// ```
pub struct CoalescingGroup<T> {
    inflight: InFlight<T>,
    waiters: Arc<AtomicUsize>,
}

impl<T> Clone for CoalescingGroup<T> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
            waiters: Arc::clone(&self.waiters),
        }
    }
}

impl<T> Default for CoalescingGroup<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            waiters: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl<T> std::fmt::Debug for CoalescingGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingGroup")
            .field("in_flight", &lock(&self.inflight).len())
            .field("waiters", &self.waiters.load(Ordering::SeqCst))
            .finish()
    }
}

fn lock<K>(map: &Mutex<K>) -> MutexGuard<'_, K> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> CoalescingGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` under `key`, or join the execution already running for it.
    ///
    /// `work` is only called by the leader. Dropping the returned future
    /// stops waiting without affecting the leader.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> MediaStoreResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MediaStoreResult<T>> + Send + 'static,
    {
        let mut rx = self.join_or_lead(key, work);
        let _waiting = WaiterGuard::enter(&self.waiters);
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                let last = rx.borrow().clone();
                return last.unwrap_or_else(|| {
                    Err(MediaError::internal(format!(
                        "coalesced operation for {} was abandoned",
                        key
                    ))
                    .into())
                });
            }
        }
    }

    fn join_or_lead<F, Fut>(&self, key: &str, work: F) -> watch::Receiver<Outcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MediaStoreResult<T>> + Send + 'static,
    {
        let mut inflight = lock(&self.inflight);
        if let Some(rx) = inflight.get(key) {
            tracing::debug!(key, "Joining in-flight operation");
            return rx.clone();
        }
        let (tx, rx) = watch::channel(None);
        inflight.insert(key.to_string(), rx.clone());
        drop(inflight);

        let fut = work();
        let cleanup = ForgetKey {
            inflight: Arc::clone(&self.inflight),
            key: key.to_string(),
        };
        tokio::spawn(async move {
            let outcome = fut.await;
            // Forget the key before publishing so late arrivals start fresh.
            drop(cleanup);
            let _ = tx.send(Some(outcome));
        });
        rx
    }

    /// Callers currently waiting on any key.
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }

    /// Keys with an execution in progress.
    pub fn in_flight(&self) -> usize {
        lock(&self.inflight).len()
    }
}

struct ForgetKey<T> {
    inflight: InFlight<T>,
    key: String,
}

impl<T> Drop for ForgetKey<T> {
    fn drop(&mut self) {
        lock(&self.inflight).remove(&self.key);
    }
}

struct WaiterGuard {
    waiters: Arc<AtomicUsize>,
}

impl WaiterGuard {
    fn enter(waiters: &Arc<AtomicUsize>) -> Self {
        waiters.fetch_add(1, Ordering::SeqCst);
        Self {
            waiters: Arc::clone(waiters),
        }
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediastore_error::{ErrorCategory, MediaErrorKind, MediaStoreError};
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let group: CoalescingGroup<u32> = CoalescingGroup::new();
        let calls = Arc::new(AtomicU32::new(0));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let group = group.clone();
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                group
                    .run("key", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok(7)
                    })
                    .await
            }));
        }
        while group.waiter_count() < 8 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.in_flight(), 0);
        assert_eq!(group.waiter_count(), 0);
    }

    #[tokio::test]
    async fn errors_are_shared() {
        let group: CoalescingGroup<u32> = CoalescingGroup::new();
        let err = group
            .run("missing", || async {
                Err(MediaStoreError::media(MediaErrorKind::NotFound))
            })
            .await
            .unwrap_err();
        assert!(err.is(ErrorCategory::NotFound));
    }

    #[tokio::test]
    async fn dropped_caller_stops_waiting() {
        let group: CoalescingGroup<u32> = CoalescingGroup::new();
        let task = {
            let group = group.clone();
            tokio::spawn(async move {
                group
                    .run("slow", || async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        while group.waiter_count() == 0 {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;
        assert_eq!(group.waiter_count(), 0);
    }

    #[tokio::test]
    async fn panicking_leader_is_reported() {
        let group: CoalescingGroup<u32> = CoalescingGroup::new();
        let err = group
            .run("boom", || async {
                let fail = true;
                if fail {
                    panic!("leader failed");
                }
                Ok(1)
            })
            .await
            .unwrap_err();
        assert!(err.is(ErrorCategory::Internal));
        assert_eq!(group.in_flight(), 0);
    }
}
