//! Startup and shutdown coordination.

use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

use super::PutioDownloader;

/// How long shutdown waits for watchers before giving up
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl PutioDownloader {
    /// Verify credentials, reconcile pre-existing transfers, and start the
    /// service loops.
    ///
    /// Startup order matters: the worker pools come up first so the
    /// reconciler's events have consumers, the reconciler classifies
    /// everything that already exists remotely, and only then does the
    /// poller begin claiming unseen transfers.
    ///
    /// Returns the join handles of the spawned long-lived tasks.
    ///
    /// # Errors
    ///
    /// [`Error::AccountVerification`] when the remote account cannot be
    /// verified; this is fatal and no task is spawned.
    pub async fn start(&self) -> Result<Vec<JoinHandle<()>>> {
        let account = self
            .putio
            .get_account_info()
            .await
            .map_err(|e| Error::AccountVerification(e.to_string()))?;
        tracing::info!(username = %account.username, "put.io account verified");

        let mut handles = Vec::new();
        handles.extend(self.start_fetch_workers());
        handles.extend(self.start_transfer_workers());

        self.reconcile_existing().await;

        handles.push(self.start_poller());
        tracing::info!(
            orchestration_workers = self.config.download.orchestration_workers,
            download_workers = self.config.download.download_workers,
            polling_interval_secs = self.config.download.polling_interval,
            "Download orchestration started"
        );
        Ok(handles)
    }

    /// Gracefully shut down the downloader.
    ///
    /// Cancels the root token, which makes every worker drain its current
    /// operation and exit, then waits for the remaining watchers with a
    /// timeout. Partially written downloads are cleaned up by the fetcher's
    /// error path.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");
        self.cancel.cancel();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.watchers.join_all()).await {
            Ok(()) => tracing::info!("All watchers exited"),
            Err(_) => tracing::warn!(
                timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                "Timeout waiting for watchers to exit"
            ),
        }
        tracing::info!("Graceful shutdown complete");
    }
}
