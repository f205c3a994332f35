//! Background task lifecycle.
//!
//! All long-running tasks share one `CancellationToken` and one `TaskTracker`.
//! Shutdown cancels the token, closes the tracker and waits for it to drain,
//! so every caller returns only after every task has finished.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Owns the service's long-running tasks.
pub(crate) struct Lifecycle {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Token the tasks watch for shutdown.
    pub(crate) fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawns a tracked task on the current Tokio runtime.
    ///
    /// The task runs in its own spawn so a panic is reported by name instead
    /// of unwinding through the tracker.
    pub(crate) fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.tracker.spawn(async move {
            match handle.await {
                Ok(()) => log::debug!("{} stopped", name),
                Err(e) => log::error!("{} terminated abnormally: {}", name, e),
            }
        });
        log::debug!("Started {}", name);
    }

    /// Number of tasks still running.
    pub(crate) fn tracked(&self) -> usize {
        self.tracker.len()
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels every task and waits for all of them to finish.
    pub(crate) async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn spawn_worker(lifecycle: &Lifecycle, name: &'static str, stopped: &Arc<AtomicUsize>) {
        let token = lifecycle.token();
        let stopped = Arc::clone(stopped);
        lifecycle.spawn(name, async move {
            token.cancelled().await;
            stopped.fetch_add(1, Ordering::SeqCst);
        });
    }

    #[tokio::test]
    async fn test_shutdown_stops_and_joins_all_tasks() {
        let lifecycle = Lifecycle::new();
        let stopped = Arc::new(AtomicUsize::new(0));
        spawn_worker(&lifecycle, "one", &stopped);
        spawn_worker(&lifecycle, "two", &stopped);
        spawn_worker(&lifecycle, "three", &stopped);
        assert_eq!(lifecycle.tracked(), 3);

        lifecycle.shutdown().await;
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
        assert_eq!(lifecycle.tracked(), 0);
        assert!(lifecycle.is_shut_down());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let lifecycle = Lifecycle::new();
        let stopped = Arc::new(AtomicUsize::new(0));
        spawn_worker(&lifecycle, "worker", &stopped);

        lifecycle.shutdown().await;
        tokio::time::timeout(Duration::from_secs(1), lifecycle.shutdown())
            .await
            .expect("second shutdown must not block");
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_shutdowns_both_wait_for_tasks() {
        let lifecycle = Arc::new(Lifecycle::new());
        let finished = Arc::new(AtomicUsize::new(0));
        {
            let token = lifecycle.token();
            let finished = Arc::clone(&finished);
            lifecycle.spawn("slow", async move {
                token.cancelled().await;
                tokio::time::sleep(Duration::from_millis(300)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        let first = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.shutdown().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(lifecycle.is_shut_down());

        lifecycle.shutdown().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        first.await.expect("first shutdown");
        assert_eq!(lifecycle.tracked(), 0);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_block_shutdown() {
        let lifecycle = Lifecycle::new();
        lifecycle.spawn("faulty", async { panic!("boom") });
        tokio::time::timeout(Duration::from_secs(1), lifecycle.shutdown())
            .await
            .expect("shutdown completes");
    }

    #[tokio::test]
    async fn test_drop_cancels_token() {
        let lifecycle = Lifecycle::new();
        let token = lifecycle.token();
        drop(lifecycle);
        assert!(token.is_cancelled());
    }
}
