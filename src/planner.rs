//! Target planner
//!
//! Walks a transfer's remote file tree and produces the ordered list of
//! download targets that materializes it locally. Directory targets precede
//! the files inside them; skipped folders elide their entire subtree; a
//! folder left with no surviving descendants is suppressed entirely.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{PlanError, Result};
use crate::putio::PutioClient;
use crate::types::{DownloadTarget, FileId, TargetKind, Transfer};

/// Subtitle file extensions downloaded alongside video files
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "sub", "vtt", "ssa", "ass"];

/// Builds download plans from remote file trees
pub struct TargetPlanner {
    putio: Arc<dyn PutioClient>,
    download_directory: PathBuf,
    skip_directories: Vec<String>,
    instance_folder_id: Option<FileId>,
}

impl TargetPlanner {
    /// Build a planner from configuration.
    pub fn new(putio: Arc<dyn PutioClient>, config: &Config) -> Self {
        Self {
            putio,
            download_directory: config.download.download_directory.clone(),
            skip_directories: config
                .download
                .skip_directories
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            instance_folder_id: config.putio.instance_folder_id.map(FileId),
        }
    }

    /// Produce the ordered download plan for a transfer.
    ///
    /// An empty plan means the tree holds nothing downloadable (root skipped,
    /// or no video/subtitle leaves survive the filters).
    ///
    /// # Errors
    ///
    /// [`PlanError::NotDownloadable`] when the transfer has no file tree yet;
    /// [`PlanError::FolderMismatch`] when the transfer was saved outside the
    /// configured instance folder; remote client errors otherwise.
    pub async fn plan(&self, transfer: &Transfer) -> Result<Vec<DownloadTarget>> {
        let file_id = transfer.file_id.ok_or(PlanError::NotDownloadable {
            transfer_id: transfer.transfer_id,
        })?;

        // Guard against scope leakage when the listing was unscoped
        if let (Some(expected), Some(actual)) = (self.instance_folder_id, transfer.save_parent_id) {
            if expected != actual {
                return Err(PlanError::FolderMismatch {
                    transfer_id: transfer.transfer_id,
                    expected,
                    actual,
                }
                .into());
            }
        }

        let base = self.download_directory.clone();
        self.walk(file_id, transfer.hash(), &base, true).await
    }

    /// Recursive walk over one node of the remote tree.
    fn walk<'a>(
        &'a self,
        file_id: FileId,
        transfer_hash: &'a str,
        base: &'a Path,
        top_level: bool,
    ) -> BoxFuture<'a, Result<Vec<DownloadTarget>>> {
        async move {
            let listing = self.putio.list_files(file_id).await?;
            let local = base.join(&listing.parent.name);

            if listing.parent.is_folder() {
                if self.is_skipped(&listing.parent.name) {
                    tracing::debug!(
                        folder = %listing.parent.name,
                        transfer_hash,
                        "Skipping folder subtree"
                    );
                    return Ok(Vec::new());
                }

                let mut children = Vec::new();
                for child in &listing.files {
                    children.extend(self.walk(child.id, transfer_hash, &local, false).await?);
                }
                if children.is_empty() {
                    // Nothing survived below; don't create an empty directory
                    return Ok(Vec::new());
                }

                let mut targets = vec![DownloadTarget {
                    to: local,
                    from: None,
                    kind: TargetKind::Directory,
                    top_level,
                    transfer_hash: transfer_hash.to_string(),
                }];
                targets.extend(children);
                Ok(targets)
            } else if listing.parent.is_video() || has_subtitle_extension(&listing.parent.name) {
                let url = self.putio.get_file_url(listing.parent.id).await?;
                Ok(vec![DownloadTarget {
                    to: local,
                    from: Some(url),
                    kind: TargetKind::File,
                    top_level,
                    transfer_hash: transfer_hash.to_string(),
                }])
            } else {
                tracing::debug!(
                    file = %listing.parent.name,
                    file_type = %listing.parent.file_type,
                    transfer_hash,
                    "Ignoring file of unhandled type"
                );
                Ok(Vec::new())
            }
        }
        .boxed()
    }

    fn is_skipped(&self, folder_name: &str) -> bool {
        let name = folder_name.to_lowercase();
        self.skip_directories.iter().any(|skip| *skip == name)
    }
}

/// True when the file name carries a recognized subtitle extension.
fn has_subtitle_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUBTITLE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
