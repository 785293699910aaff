//! Core downloader implementation split into focused submodules.
//!
//! The `PutioDownloader` struct and its methods are organized by role:
//! - [`lifecycle`] - Startup verification, service spawning, and shutdown
//! - [`poller`] - Polling producer emitting newly downloadable transfers
//! - [`reconciler`] - One-shot boot classification of pre-existing transfers
//! - [`workers`] - Orchestration worker pool driving the transfer lifecycle
//! - [`fetch_workers`] - Bounded worker pool materializing download targets
//! - [`import_watcher`] - Arr import polling and post-import local cleanup
//! - [`seed_watcher`] - Remote seeding polling and post-seed remote cleanup

mod fetch_workers;
mod import_watcher;
mod lifecycle;
mod poller;
mod reconciler;
mod seed_watcher;
mod workers;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::arr::ArrClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::FileFetcher;
use crate::planner::TargetPlanner;
use crate::putio::{HttpPutioClient, PutioClient};
use crate::seen::SeenSet;
use crate::tracker::WatcherTracker;
use crate::types::{DownloadTask, TransferEvent};

/// Capacity of the transfer-events channel; a full channel blocks the
/// producer until an orchestration worker drains it
pub(crate) const TRANSFER_EVENT_BUFFER: usize = 100;

/// Capacity of the download-tasks channel, same backpressure discipline
pub(crate) const DOWNLOAD_TASK_BUFFER: usize = 100;

/// Bounded channels connecting the poller, the orchestration workers, and
/// the fetch workers
///
/// The receiving halves are shared behind mutexes so a configurable number
/// of workers can compete for messages.
#[derive(Clone)]
pub(crate) struct EventChannels {
    pub(crate) transfer_tx: mpsc::Sender<TransferEvent>,
    pub(crate) transfer_rx: Arc<Mutex<mpsc::Receiver<TransferEvent>>>,
    pub(crate) task_tx: mpsc::Sender<DownloadTask>,
    pub(crate) task_rx: Arc<Mutex<mpsc::Receiver<DownloadTask>>>,
}

impl EventChannels {
    fn new() -> Self {
        let (transfer_tx, transfer_rx) = mpsc::channel(TRANSFER_EVENT_BUFFER);
        let (task_tx, task_rx) = mpsc::channel(DOWNLOAD_TASK_BUFFER);
        Self {
            transfer_tx,
            transfer_rx: Arc::new(Mutex::new(transfer_rx)),
            task_tx,
            task_rx: Arc::new(Mutex::new(task_rx)),
        }
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
///
/// Observes put.io transfers, materializes them into local file downloads,
/// waits for Arr-side import confirmation, and cleans up both local disk and
/// the remote account afterwards. All state is in memory; a restart is a
/// full rediscovery from the remote listing.
#[derive(Clone)]
pub struct PutioDownloader {
    pub(crate) config: Arc<Config>,
    pub(crate) putio: Arc<dyn PutioClient>,
    pub(crate) arr_services: Arc<Vec<ArrClient>>,
    pub(crate) planner: Arc<TargetPlanner>,
    pub(crate) fetcher: Arc<FileFetcher>,
    pub(crate) channels: EventChannels,
    pub(crate) seen: Arc<SeenSet>,
    pub(crate) watchers: Arc<WatcherTracker>,
    pub(crate) cancel: CancellationToken,
}

impl PutioDownloader {
    /// Build a downloader from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the HTTP
    /// clients cannot be constructed.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let putio = Arc::new(HttpPutioClient::new(&config.putio, config.retry.clone())?);
        Self::with_client(config, putio)
    }

    /// Build a downloader around an explicit remote client implementation.
    pub(crate) fn with_client(config: Config, putio: Arc<dyn PutioClient>) -> Result<Self> {
        let mut arr_services = Vec::new();
        for (name, service) in config.arr_services() {
            arr_services.push(ArrClient::new(name, service).map_err(Error::Network)?);
        }
        let planner = Arc::new(TargetPlanner::new(putio.clone(), &config));
        let fetcher = Arc::new(FileFetcher::new(&config.download).map_err(Error::Network)?);

        Ok(Self {
            config: Arc::new(config),
            putio,
            arr_services: Arc::new(arr_services),
            planner,
            fetcher,
            channels: EventChannels::new(),
            seen: Arc::new(SeenSet::new()),
            watchers: Arc::new(WatcherTracker::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Enqueue a transfer event, honoring cancellation while blocked on a
    /// full channel.
    pub(crate) async fn send_event(&self, event: TransferEvent) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            sent = self.channels.transfer_tx.send(event) => {
                sent.map_err(|_| Error::ChannelClosed("transfer-events"))
            }
        }
    }

    /// Enqueue a download task, honoring cancellation while blocked on a
    /// full channel.
    pub(crate) async fn send_task(&self, task: DownloadTask) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            sent = self.channels.task_tx.send(task) => {
                sent.map_err(|_| Error::ChannelClosed("download-tasks"))
            }
        }
    }
}
