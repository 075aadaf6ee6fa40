//! Bounded worker pools for remote fetches and thumbnail generation.

use mediastore_error::{MediaError, MediaStoreResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs futures on spawned tasks, at most `size` at a time.
///
/// A full pool makes [`schedule`](WorkerPool::schedule) wait for a free slot;
/// work already running is unaffected.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    size: usize,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a pool with `size` slots.
    pub fn new(name: &'static str, size: usize) -> Self {
        let size = size.max(1);
        Self {
            name,
            size,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    /// Pool name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free slot, then run `work` to completion on its own task.
    ///
    /// The work keeps running if the caller stops waiting.
    pub async fn schedule<F, T>(&self, work: F) -> MediaStoreResult<T>
    where
        F: Future<Output = MediaStoreResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| MediaError::internal(format!("{} pool is closed", self.name)))?;
        tracing::trace!(pool = self.name, available = self.available(), "Scheduled work");
        let handle = tokio::spawn(async move {
            let _permit = permit;
            work.await
        });
        handle
            .await
            .map_err(|e| MediaError::internal(format!("{} worker failed: {}", self.name, e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_pool_size() {
        let pool = WorkerPool::new("test", 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                pool.schedule(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn panicking_work_is_an_error() {
        let pool = WorkerPool::new("test", 1);
        let result: MediaStoreResult<()> = pool
            .schedule(async {
                let fail = true;
                if fail {
                    panic!("decoder crashed");
                }
                Ok(())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(pool.available(), 1);
    }
}
