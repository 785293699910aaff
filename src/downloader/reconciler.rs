//! Startup reconciler - classifies transfers that already exist remotely.
//!
//! Runs once at boot, before the poller starts. A transfer whose entire
//! plan is already recorded as imported by the Arr services re-enters the
//! state machine at the seed-watch stage without re-downloading; anything
//! else is left unseen for the poller to claim.

use std::sync::Arc;

use crate::error::Result;
use crate::putio::RemoteTransfer;
use crate::types::{FileId, TargetKind, Transfer, TransferEvent};

use super::PutioDownloader;

impl PutioDownloader {
    /// Classify each live remote transfer as already-imported or pending.
    ///
    /// Per-transfer errors are logged and skipped; a listing error aborts
    /// reconciliation entirely (the poller still starts afterwards).
    pub(crate) async fn reconcile_existing(&self) {
        let source = self.config.putio.instance_name.as_deref();
        let parent = self.config.putio.instance_folder_id.map(FileId);
        let transfers = match self.putio.list_transfers(source, parent).await {
            Ok(transfers) => transfers,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list transfers for reconciliation");
                return;
            }
        };

        tracing::info!(count = transfers.len(), "Reconciling existing transfers");
        for remote in &transfers {
            if let Err(e) = self.reconcile_transfer(remote).await {
                tracing::warn!(
                    transfer_id = remote.id.0,
                    error = %e,
                    "Skipping transfer during reconciliation"
                );
            }
        }
    }

    async fn reconcile_transfer(&self, remote: &RemoteTransfer) -> Result<()> {
        if !remote.is_downloadable() {
            return Ok(());
        }

        let transfer = Arc::new(Transfer::from_remote(remote));
        let targets = self.planner.plan(&transfer).await?;
        if targets.is_empty() {
            return Ok(());
        }

        for target in targets.iter().filter(|t| t.kind == TargetKind::File) {
            if !self.is_target_imported(&target.to).await {
                tracing::debug!(%transfer, "Transfer pending, the poller will claim it");
                return Ok(());
            }
        }

        transfer.set_targets(targets).await;
        self.seen.insert(transfer.transfer_id).await;
        tracing::info!(%transfer, "Transfer already imported, resuming seed watch");
        self.send_event(TransferEvent::Imported(transfer)).await?;
        Ok(())
    }
}
