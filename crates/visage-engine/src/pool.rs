//! Bounded off-load of CPU/GPU-bound pipeline work.

use std::sync::Arc;

use tokio::sync::Semaphore;
use visage_core::errors::VisageError;

/// Fixed-size worker gate in front of `spawn_blocking`.
///
/// Model stages contend for a small number of compute devices; without the
/// gate every connection would spawn its own blocking task and oversubscribe
/// them. Awaiting `run` is the only suspension point heavy work introduces on
/// the transport runtime.
pub struct ComputePool {
    permits: Arc<Semaphore>,
}

impl ComputePool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Run `f` on the blocking pool once a worker slot frees up.
    pub async fn run<T, F>(&self, f: F) -> Result<T, VisageError>
    where
        F: FnOnce() -> Result<T, VisageError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| VisageError::ModelInference("compute pool closed".into()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|e| VisageError::ModelInference(format!("compute task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn run_returns_the_closure_result() {
        let pool = ComputePool::new(2);
        let out = pool.run(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn run_propagates_errors() {
        let pool = ComputePool::new(1);
        let out: Result<(), _> = pool
            .run(|| Err(VisageError::ModelInference("boom".into())))
            .await;
        assert!(matches!(out, Err(VisageError::ModelInference(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_the_worker_count() {
        let pool = Arc::new(ComputePool::new(2));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    pool.run(move || {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2, "peak: {peak:?}");
    }
}
