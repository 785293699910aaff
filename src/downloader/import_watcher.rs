//! Import watcher - polls Arr history until a transfer's files are imported.
//!
//! A transfer counts as imported when every file target in its plan is
//! recorded as the dropped path of a `downloadFolderImported` event by at
//! least one configured Arr service. Once that happens the local artifact is
//! deleted and the transfer moves on to seed watching.

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{TargetKind, Transfer, TransferEvent};

use super::PutioDownloader;

impl PutioDownloader {
    /// Poll until the transfer is imported, then clean up locally and emit
    /// [`TransferEvent::Imported`].
    ///
    /// There is no ceiling: a transfer the Arr side never imports is polled
    /// until cancellation.
    pub(crate) async fn watch_for_import(&self, transfer: Arc<Transfer>) -> Result<()> {
        tracing::info!(%transfer, "Watching for import");
        let interval = self.config.download.interval();
        loop {
            if self.is_transfer_imported(&transfer).await {
                self.delete_local_artifact(&transfer).await;
                match self.send_event(TransferEvent::Imported(transfer.clone())).await {
                    Ok(()) => {}
                    Err(Error::Cancelled) => {
                        tracing::debug!(%transfer, "Import watch cancelled");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
                tracing::info!(%transfer, "Imported");
                return Ok(());
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(%transfer, "Import watch cancelled");
                    return Ok(());
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Whether every file target of the plan has been imported somewhere.
    async fn is_transfer_imported(&self, transfer: &Transfer) -> bool {
        let Some(targets) = transfer.targets().await else {
            return false;
        };
        let mut any_file = false;
        for target in targets.iter().filter(|t| t.kind == TargetKind::File) {
            any_file = true;
            if !self.is_target_imported(&target.to).await {
                return false;
            }
        }
        any_file
    }

    /// Probe the configured Arr services in order; the first one reporting
    /// the path imported wins. Unavailable services (open breaker, service
    /// down) are skipped quietly, other probe failures at warning level.
    pub(crate) async fn is_target_imported(&self, path: &Path) -> bool {
        for service in self.arr_services.iter() {
            match service.is_imported(path).await {
                Ok(true) => {
                    tracing::debug!(
                        service = service.name(),
                        path = %path.display(),
                        "Import confirmed"
                    );
                    return true;
                }
                Ok(false) => {}
                Err(e) if e.is_circuit_open() || e.is_connection_refused() => {
                    tracing::debug!(
                        service = service.name(),
                        error = %e,
                        "History probe unavailable, skipping service"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        service = service.name(),
                        error = %e,
                        "History probe failed, skipping service"
                    );
                }
            }
        }
        false
    }

    /// Delete the transfer's top-level local artifact. Already-absent paths
    /// are not an error.
    async fn delete_local_artifact(&self, transfer: &Transfer) {
        let Some(top) = transfer.top_level_target().await else {
            return;
        };
        match tokio::fs::metadata(&top.to).await {
            Ok(meta) if meta.is_dir() => {
                match tokio::fs::remove_dir_all(&top.to).await {
                    Ok(()) => tracing::info!(path = %top.to.display(), "Deleted local artifact"),
                    Err(e) => tracing::warn!(
                        path = %top.to.display(),
                        error = %e,
                        "Could not delete imported directory"
                    ),
                }
            }
            Ok(_) => match tokio::fs::remove_file(&top.to).await {
                Ok(()) => tracing::info!(path = %top.to.display(), "Deleted local artifact"),
                Err(e) => tracing::warn!(
                    path = %top.to.display(),
                    error = %e,
                    "Could not delete imported file"
                ),
            },
            Err(_) => {
                tracing::debug!(path = %top.to.display(), "Local artifact already absent");
            }
        }
    }
}
