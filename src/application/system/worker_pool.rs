use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

/// Fixed number of concurrently running requests.
///
/// CPU-heavy estimator work is moved to the blocking pool by the request
/// itself, so a slot stays held while its training or flush runs.
#[derive(Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            slots: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait for a free slot, then run `task` on the runtime holding it
    pub async fn spawn<F, T>(&self, task: F) -> Result<JoinHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit: OwnedSemaphorePermit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .context("Worker pool closed")?;
        debug!("WorkerPool: slot acquired ({} free)", self.available());
        Ok(tokio::spawn(async move {
            let output = task.await;
            drop(permit);
            output
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let running = running.clone();
            let peak = peak.clone();
            handles.push(
                pool.spawn(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap(),
            );
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_zero_size_is_raised_to_one() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
