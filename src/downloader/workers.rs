//! Orchestration workers - drive transfers through their lifecycle.
//!
//! Workers compete for events on the transfer-events channel. A queued
//! transfer is planned and its targets submitted to the fetch pool; a
//! downloaded transfer gets an import watcher; an imported transfer gets a
//! seed watcher. Errors in a single event never take a worker down.

use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::types::{DownloadOutcome, DownloadTask, Transfer, TransferEvent};

use super::PutioDownloader;

impl PutioDownloader {
    /// Start the orchestration worker pool.
    pub fn start_transfer_workers(&self) -> Vec<JoinHandle<()>> {
        (0..self.config.download.orchestration_workers)
            .map(|worker_id| {
                let downloader = self.clone();
                tokio::spawn(async move { downloader.transfer_worker_loop(worker_id).await })
            })
            .collect()
    }

    async fn transfer_worker_loop(&self, worker_id: usize) {
        loop {
            let event = {
                let mut rx = self.channels.transfer_rx.lock().await;
                tokio::select! {
                    _ = self.cancel.cancelled() => None,
                    event = rx.recv() => event,
                }
            };
            let Some(event) = event else { break };

            if let Err(e) = self.handle_event(event).await {
                tracing::error!(worker_id, error = %e, "Transfer event handling failed");
            }
        }
        tracing::debug!(worker_id, "Transfer worker exited");
    }

    /// Dispatch one transfer event.
    pub(crate) async fn handle_event(&self, event: TransferEvent) -> Result<()> {
        match event {
            TransferEvent::QueuedForDownload(transfer) => self.handle_queued(transfer).await,
            TransferEvent::Downloaded(transfer) => {
                let label = format!("import/{}", transfer.transfer_id);
                let downloader = self.clone();
                self.watchers
                    .spawn(label, async move { downloader.watch_for_import(transfer).await })
                    .await;
                Ok(())
            }
            TransferEvent::Imported(transfer) => {
                let label = format!("seed/{}", transfer.transfer_id);
                let downloader = self.clone();
                self.watchers
                    .spawn(label, async move { downloader.watch_seeding(transfer).await })
                    .await;
                Ok(())
            }
        }
    }

    /// Plan a queued transfer, fetch every target, and re-post `Downloaded`.
    ///
    /// Submission into the download-tasks channel blocks when the pool is
    /// saturated. A transfer with any failed target is abandoned: it stays
    /// in the seen set and is only reconsidered if the remote side removes
    /// and re-adds it.
    async fn handle_queued(&self, transfer: Arc<Transfer>) -> Result<()> {
        tracing::info!(%transfer, "Download started");
        let targets = self.planner.plan(&transfer).await?;
        if targets.is_empty() {
            tracing::info!(%transfer, "Plan is empty, nothing to download");
            return Ok(());
        }

        let mut completions = Vec::with_capacity(targets.len());
        for target in &targets {
            let (done_tx, done_rx) = oneshot::channel();
            self.send_task(DownloadTask {
                target: target.clone(),
                done_tx,
            })
            .await?;
            completions.push(done_rx);
        }

        let mut all_succeeded = true;
        for completion in completions {
            match completion.await {
                Ok(DownloadOutcome::Success) => {}
                Ok(DownloadOutcome::Failed) | Err(_) => all_succeeded = false,
            }
        }

        if all_succeeded {
            transfer.set_targets(targets).await;
            tracing::info!(%transfer, "Download done");
            self.send_event(TransferEvent::Downloaded(transfer)).await?;
        } else {
            tracing::warn!(%transfer, "Not all targets downloaded, abandoning transfer");
        }
        Ok(())
    }
}
