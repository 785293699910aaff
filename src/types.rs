//! Core types for putio-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

use crate::putio::RemoteTransfer;

/// Hash shown for transfers whose infohash is not yet known
const UNKNOWN_HASH: &str = "0000";

/// Name shown for transfers the remote side reported without one
const UNKNOWN_NAME: &str = "Unknown";

/// Unique identifier of a remote transfer
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TransferId(pub u64);

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TransferId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Unique identifier of a remote file or folder
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FileId(pub i64);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for FileId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Process-local mirror of a remote transfer
///
/// Created by the poller or the startup reconciler from a remote listing
/// record and passed through the event pipeline behind an [`Arc`]. The target
/// plan is attached after planning completes, under an internal lock; all
/// other fields are immutable for the life of the mirror.
#[derive(Debug)]
pub struct Transfer {
    /// Remote transfer identifier
    pub transfer_id: TransferId,
    /// Human-readable label
    pub name: String,
    /// Root of the remote file tree; absent until the transfer is downloadable
    pub file_id: Option<FileId>,
    /// BitTorrent infohash, when known
    pub hash: Option<String>,
    /// Remote folder the transfer was saved under
    pub save_parent_id: Option<FileId>,
    /// Total size in bytes reported by the remote side
    pub size: Option<i64>,
    /// Bytes downloaded so far on the remote side
    pub downloaded: Option<i64>,
    targets: Mutex<Option<Vec<DownloadTarget>>>,
}

impl Transfer {
    /// Build a mirror from a remote listing record.
    pub fn from_remote(remote: &RemoteTransfer) -> Self {
        Self {
            transfer_id: remote.id,
            name: remote
                .name
                .clone()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            file_id: remote.file_id,
            hash: remote.hash.clone(),
            save_parent_id: remote.save_parent_id,
            size: remote.size,
            downloaded: remote.downloaded,
            targets: Mutex::new(None),
        }
    }

    /// The transfer's infohash, or `"0000"` when the remote side has not
    /// reported one.
    pub fn hash(&self) -> &str {
        self.hash.as_deref().unwrap_or(UNKNOWN_HASH)
    }

    /// Bytes still to download on the remote side.
    ///
    /// Clamped to 0 when the remote reports `downloaded > size`.
    pub fn left_until_done(&self) -> u64 {
        let size = self.size.unwrap_or(0);
        let downloaded = self.downloaded.unwrap_or(0);
        size.saturating_sub(downloaded).max(0) as u64
    }

    /// Attach the download plan produced by the target planner.
    pub async fn set_targets(&self, targets: Vec<DownloadTarget>) {
        let mut guard = self.targets.lock().await;
        *guard = Some(targets);
    }

    /// The attached download plan, if planning has completed.
    pub async fn targets(&self) -> Option<Vec<DownloadTarget>> {
        self.targets.lock().await.clone()
    }

    /// The single target whose path is the transfer's local root, used for
    /// post-import cleanup.
    pub async fn top_level_target(&self) -> Option<DownloadTarget> {
        self.targets
            .lock()
            .await
            .as_ref()
            .and_then(|targets| targets.iter().find(|t| t.top_level).cloned())
    }
}

impl std::fmt::Display for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.transfer_id)
    }
}

/// Kind of a [`DownloadTarget`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A local directory to create
    Directory,
    /// A file to fetch over HTTP
    File,
}

/// One instruction in a download plan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Absolute local filesystem path
    pub to: PathBuf,
    /// Source HTTP URL; present iff `kind` is [`TargetKind::File`]
    pub from: Option<String>,
    /// Whether this target is a directory or a file
    pub kind: TargetKind,
    /// True on exactly the one target whose path is the transfer's local root
    pub top_level: bool,
    /// Infohash of the owning transfer, for log correlation
    pub transfer_hash: String,
}

impl std::fmt::Display for DownloadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to.display())
    }
}

/// Lifecycle event for a transfer, carried on the transfer-events channel
#[derive(Clone, Debug)]
pub enum TransferEvent {
    /// A new downloadable transfer was observed; a plan must be built and fetched
    QueuedForDownload(Arc<Transfer>),
    /// Every target of the plan completed successfully
    Downloaded(Arc<Transfer>),
    /// Every file target was confirmed imported by an Arr service
    Imported(Arc<Transfer>),
}

impl TransferEvent {
    /// The transfer this event refers to.
    pub fn transfer(&self) -> &Arc<Transfer> {
        match self {
            TransferEvent::QueuedForDownload(t)
            | TransferEvent::Downloaded(t)
            | TransferEvent::Imported(t) => t,
        }
    }
}

/// Terminal status of a single download task
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The target was materialized on disk
    Success,
    /// The target could not be fetched
    Failed,
}

/// A unit of work for the fetch worker pool
///
/// The submitting orchestration worker keeps the receiving half of `done_tx`
/// and blocks on it until the fetch worker resolves the outcome.
#[derive(Debug)]
pub struct DownloadTask {
    /// The target to materialize
    pub target: DownloadTarget,
    /// Completion promise back to the submitting worker
    pub done_tx: oneshot::Sender<DownloadOutcome>,
}
