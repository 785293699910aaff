//! Background watcher tracking
//!
//! Import and seed watchers are long-running tasks spawned by orchestration
//! workers. They must not be fire-and-forget: their terminal errors have to
//! be observed, and their handles must not accumulate without bound. The
//! tracker sweeps completed handles before every insert, which bounds memory
//! to the number of currently-alive watchers.

use std::future::Future;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::Result;

struct TrackedWatcher {
    label: String,
    handle: JoinHandle<()>,
}

/// Tracks spawned watcher tasks and absorbs their completion
#[derive(Default)]
pub struct WatcherTracker {
    watchers: Mutex<Vec<TrackedWatcher>>,
}

impl WatcherTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a watcher and track its handle.
    ///
    /// The watcher's terminal error, if any, is logged at error level; a
    /// clean exit is absorbed silently. Completed handles accumulated since
    /// the last call are swept first.
    pub async fn spawn<F>(&self, label: impl Into<String>, watcher: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let label = label.into();
        let task_label = label.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = watcher.await {
                tracing::error!(watcher = %task_label, error = %e, "Watcher terminated with error");
            }
        });

        let mut watchers = self.watchers.lock().await;
        Self::sweep(&mut watchers).await;
        watchers.push(TrackedWatcher { label, handle });
    }

    /// Number of still-alive tracked watchers.
    pub async fn len(&self) -> usize {
        let mut watchers = self.watchers.lock().await;
        Self::sweep(&mut watchers).await;
        watchers.len()
    }

    /// Whether no watcher is alive.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Await every remaining watcher. Used during shutdown after the root
    /// token has been cancelled.
    pub async fn join_all(&self) {
        let drained: Vec<TrackedWatcher> = {
            let mut watchers = self.watchers.lock().await;
            watchers.drain(..).collect()
        };
        for watcher in drained {
            Self::absorb(watcher).await;
        }
    }

    /// Remove finished entries, observing their join results.
    async fn sweep(watchers: &mut Vec<TrackedWatcher>) {
        let mut alive = Vec::with_capacity(watchers.len());
        for watcher in watchers.drain(..) {
            if watcher.handle.is_finished() {
                Self::absorb(watcher).await;
            } else {
                alive.push(watcher);
            }
        }
        *watchers = alive;
    }

    async fn absorb(watcher: TrackedWatcher) {
        if let Err(e) = watcher.handle.await {
            tracing::error!(watcher = %watcher.label, error = %e, "Watcher task panicked");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::time::Duration;

    #[tokio::test]
    async fn completed_watchers_are_swept_before_insert() {
        let tracker = WatcherTracker::new();
        tracker.spawn("quick", async { Ok(()) }).await;

        // Let the first watcher finish
        tokio::time::sleep(Duration::from_millis(20)).await;

        tracker
            .spawn("slow", async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        assert_eq!(tracker.len().await, 1, "finished watcher must be swept");
    }

    #[tokio::test]
    async fn erroring_watcher_is_absorbed_without_leaking() {
        let tracker = WatcherTracker::new();
        tracker
            .spawn("failing", async { Err(Error::ChannelClosed("transfer-events")) })
            .await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(tracker.is_empty().await);
    }

    #[tokio::test]
    async fn join_all_waits_for_remaining_watchers() {
        let tracker = WatcherTracker::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tracker
            .spawn("waiting", async move {
                rx.await.ok();
                Ok(())
            })
            .await;

        tx.send(()).unwrap();
        tracker.join_all().await;
        assert!(tracker.is_empty().await);
    }
}
