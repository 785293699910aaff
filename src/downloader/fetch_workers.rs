//! Fetch workers - materialize download targets from the task channel.

use tokio::task::JoinHandle;

use crate::error::FetchError;
use crate::types::DownloadOutcome;

use super::PutioDownloader;

impl PutioDownloader {
    /// Start the file-fetch worker pool.
    ///
    /// Workers compete for tasks on the download-tasks channel and resolve
    /// each task's completion promise with the fetch outcome. There is no
    /// retry at this layer; transient HTTP failures are the fetcher client's
    /// concern.
    pub fn start_fetch_workers(&self) -> Vec<JoinHandle<()>> {
        (0..self.config.download.download_workers)
            .map(|worker_id| {
                let downloader = self.clone();
                tokio::spawn(async move { downloader.fetch_worker_loop(worker_id).await })
            })
            .collect()
    }

    async fn fetch_worker_loop(&self, worker_id: usize) {
        loop {
            let task = {
                let mut rx = self.channels.task_rx.lock().await;
                tokio::select! {
                    _ = self.cancel.cancelled() => None,
                    task = rx.recv() => task,
                }
            };
            let Some(task) = task else { break };

            let outcome = match self.fetcher.fetch(&task.target, &self.cancel).await {
                Ok(()) => DownloadOutcome::Success,
                Err(FetchError::Cancelled) => {
                    tracing::debug!(target = %task.target, "Fetch cancelled");
                    DownloadOutcome::Failed
                }
                Err(e) => {
                    tracing::warn!(
                        target = %task.target,
                        transfer_hash = %task.target.transfer_hash,
                        error = %e,
                        "Download target failed"
                    );
                    DownloadOutcome::Failed
                }
            };

            // The submitting worker may have gone away; nothing to do then
            task.done_tx.send(outcome).ok();
        }
        tracing::debug!(worker_id, "Fetch worker exited");
    }
}
