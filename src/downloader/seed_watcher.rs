//! Seed watcher - polls the remote transfer until seeding stops, then
//! cleans up both the remote transfer and its file tree.

use std::sync::Arc;

use crate::error::Result;
use crate::putio::TransferStatus;
use crate::types::Transfer;

use super::PutioDownloader;

impl PutioDownloader {
    /// Poll the remote transfer status; once it is anything other than
    /// `SEEDING`, remove the transfer and delete its file tree remotely.
    ///
    /// Both cleanup calls are best-effort: the remote side may have dropped
    /// the objects already, and a failure only warrants a warning. Status
    /// fetch errors are logged and polling continues.
    pub(crate) async fn watch_seeding(&self, transfer: Arc<Transfer>) -> Result<()> {
        tracing::info!(%transfer, "Watching seeding");
        let interval = self.config.download.interval();
        loop {
            match self.putio.get_transfer(transfer.transfer_id).await {
                Ok(remote) if remote.status == TransferStatus::Seeding => {}
                Ok(remote) => {
                    tracing::info!(
                        %transfer,
                        status = ?remote.status,
                        "Seeding stopped, cleaning up remote"
                    );
                    self.cleanup_remote(&transfer).await;
                    tracing::info!(%transfer, "Done seeding");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(%transfer, error = %e, "Could not fetch transfer status");
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(%transfer, "Seed watch cancelled");
                    return Ok(());
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    async fn cleanup_remote(&self, transfer: &Transfer) {
        match self.putio.remove_transfer(transfer.transfer_id).await {
            Ok(()) => tracing::info!(%transfer, "Removed remote transfer"),
            Err(e) => tracing::warn!(%transfer, error = %e, "Could not remove remote transfer"),
        }
        if let Some(file_id) = transfer.file_id {
            match self.putio.delete_file(file_id).await {
                Ok(()) => tracing::info!(%transfer, "Deleted remote files"),
                Err(e) => tracing::warn!(%transfer, error = %e, "Could not delete remote files"),
            }
        }
    }
}
