//! Poller - emits new downloadable transfers into the event pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::types::{FileId, Transfer, TransferEvent, TransferId};

use super::PutioDownloader;

/// Minimum spacing between "Active transfers" summary logs
const SUMMARY_INTERVAL: Duration = Duration::from_secs(60);

impl PutioDownloader {
    /// Start the polling producer task.
    ///
    /// On every tick the live transfer listing is fetched, new downloadable
    /// transfers are emitted as [`TransferEvent::QueuedForDownload`], and the
    /// seen set is pruned to the live listing. Listing errors are logged and
    /// retried on the next tick; the loop only exits on cancellation.
    pub fn start_poller(&self) -> JoinHandle<()> {
        let downloader = self.clone();
        tokio::spawn(async move {
            let interval = downloader.config.download.interval();
            let mut last_summary: Option<Instant> = None;
            loop {
                match downloader.poll_once(&mut last_summary).await {
                    Ok(()) => {}
                    Err(Error::Cancelled) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Transfer listing failed, retrying next tick");
                    }
                }
                tokio::select! {
                    _ = downloader.cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::debug!("Poller exited");
        })
    }

    /// One polling tick: list, emit new downloadable transfers in listing
    /// order, prune the seen set.
    pub(crate) async fn poll_once(&self, last_summary: &mut Option<Instant>) -> Result<()> {
        let source = self.config.putio.instance_name.as_deref();
        let parent = self.config.putio.instance_folder_id.map(FileId);
        let transfers = self.putio.list_transfers(source, parent).await?;

        for remote in &transfers {
            if self.seen.contains(remote.id).await {
                continue;
            }
            if !remote.is_downloadable() {
                tracing::trace!(transfer_id = remote.id.0, "Transfer not yet downloadable");
                continue;
            }
            let transfer = Arc::new(Transfer::from_remote(remote));
            tracing::info!(%transfer, "New transfer queued for download");
            self.send_event(TransferEvent::QueuedForDownload(transfer)).await?;
            self.seen.insert(remote.id).await;
        }

        // Ids the remote side dropped are released so a re-added transfer
        // gets processed again
        let live: Vec<TransferId> = transfers.iter().map(|t| t.id).collect();
        self.seen.prune(&live).await;

        let summary_due = last_summary.map_or(true, |at| at.elapsed() >= SUMMARY_INTERVAL);
        if summary_due {
            tracing::info!(active = transfers.len(), "Active transfers: {}", transfers.len());
            *last_summary = Some(Instant::now());
        }
        Ok(())
    }
}
