//! Tracking of fire-and-forget work
//!
//! Background refreshes are never awaited by the request that started them.
//! They are registered here instead so the host can keep the process alive
//! until they settle, the way a service worker extends its lifetime with
//! `waitUntil`.

use std::future::Future;
use std::sync::Mutex;
use tokio::task::JoinSet;

/// Set of in-flight background tasks
#[derive(Default)]
pub struct BackgroundTasks {
    set: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `task` on the runtime and track it, collecting tasks that have
    /// already finished. Must be called from within a tokio runtime.
    pub fn spawn<T>(&self, task: T)
    where
        T: Future<Output = ()> + Send + 'static,
    {
        let mut set = self
            .set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while let Some(result) = set.try_join_next() {
            if let Err(e) = result {
                log::warn!("Background task failed: {}", e);
            }
        }
        set.spawn(task);
    }

    /// Tasks spawned and not yet collected
    pub fn len(&self) -> usize {
        self.set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until every tracked task, including tasks spawned while
    /// waiting, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut batch = std::mem::take(
                &mut *self
                    .set
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            );
            if batch.is_empty() {
                return;
            }
            while let Some(result) = batch.join_next().await {
                if let Err(e) = result {
                    log::warn!("Background task failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_idle_waits_for_all() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let done = Arc::clone(&done);
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(10 * i)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(tasks.len(), 3);
        tasks.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_collects_finished_tasks() {
        let tasks = BackgroundTasks::new();
        for _ in 0..5 {
            tasks.spawn(async {});
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        tasks.spawn(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        assert_eq!(tasks.len(), 1);
        tasks.wait_idle().await;
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_wait_idle_on_empty_returns() {
        let tasks = BackgroundTasks::new();
        tasks.wait_idle().await;
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_poison_wait() {
        let tasks = BackgroundTasks::new();
        tasks.spawn(async { panic!("refresh blew up") });
        tasks.spawn(async {});
        tasks.wait_idle().await;
        assert!(tasks.is_empty());
    }
}
